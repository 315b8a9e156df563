use clap::Parser;
use cued_speech_rt::acoustic_model::OrtSequenceModel;
use cued_speech_rt::acoustic_model::SequenceModel;
use cued_speech_rt::config::PipelineConfig;
use cued_speech_rt::corrector::SentenceCorrector;
use cued_speech_rt::decoder::CtcDecoder;
use cued_speech_rt::landmarks::read_landmark_jsonl;
use cued_speech_rt::StreamRecognizer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
pub struct Args {
    /// JSON Lines file of per-frame `LandmarkTuple` (face/hand/pose) records.
    #[clap(long, short)]
    input: PathBuf,
    /// Pipeline configuration file (decoder, corrector and acoustic model paths).
    #[clap(long, short, default_value = "config.json")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    cued_speech_rt::setup_logging();
    let args = Args::parse();

    info!("Loading pipeline configuration from {}", args.config.display());
    let text = std::fs::read_to_string(&args.config)?;
    let config: PipelineConfig = serde_json::from_str(&text)?;

    info!("Loading acoustic model from {}", config.acoustic_model_path.display());
    let mut model = OrtSequenceModel::new();
    model.load(&config.acoustic_model_path)?;

    info!("Initializing CTC decoder");
    let decoder = CtcDecoder::initialize(config.decoder.clone())?;

    info!("Loading sentence corrector resources");
    let corrector = SentenceCorrector::load_with_beam_width(
        &config.homophones_path,
        &config.corrector_lm_path,
        config.corrector_lm_dict_path.as_deref(),
        config.corrector_beam_width,
    )?;

    info!("Reading landmark stream from {}", args.input.display());
    let landmarks = read_landmark_jsonl(&args.input)?;

    let mut stream = StreamRecognizer::new(&model, &decoder, &corrector);
    for tuple in landmarks {
        if let Some(result) = stream.push(tuple) {
            print_result(&result);
        }
    }
    let result = stream.finish();
    print_result(&result);

    Ok(())
}

fn print_result(result: &cued_speech_rt::types::RecognitionResult) {
    println!(
        "[frame {}] ({:?}, {:.3}) {} -> {}",
        result.frame_number,
        result.confidence_band(),
        result.confidence,
        result.phonemes.join(" "),
        result.french_sentence,
    );
}
