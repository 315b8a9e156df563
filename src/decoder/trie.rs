//! Lexicon trie over token indices (component E, decoder build step).
//!
//! An arena of nodes (plain `Vec`, indices instead of `Rc`/`RefCell` cycles) forms a
//! prefix tree over every accepted spelling in a [`Lexicon`]. A node accepts one or
//! more `(word_index, lm_unigram_score)` pairs when a spelling ends there (homographs
//! with distinct pronunciations share a node; homophones across different words each
//! contribute their own pair). After construction every node is smeared with the
//! maximum score reachable in its subtree, giving the beam search an admissible upper
//! bound to prune against before a word is actually completed.
use crate::decoder::alphabet::Alphabet;
use crate::decoder::lexicon::Lexicon;
use crate::decoder::lm::LanguageModel;
use std::collections::HashMap;

pub const ROOT: usize = 0;

#[derive(Debug, Default)]
pub struct TrieNode {
    children: HashMap<usize, usize>,
    /// Words whose spelling ends exactly at this node.
    pub accepting: Vec<(usize, f32)>,
    /// Max `lm_unigram_score` over this node's own `accepting` entries and every
    /// descendant's, computed once by [`Trie::smear`].
    pub max_score: f32,
}

/// Arena-based prefix trie. Node 0 is always the root.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    /// Builds a trie from every accepted spelling in `lexicon`, scoring each word's
    /// acceptance with its unigram log-probability from `lm` (word indices in the
    /// lexicon and in the LM's vocabulary must agree - the caller is responsible for
    /// building both from the same word list).
    pub fn build(lexicon: &Lexicon, _alphabet: &Alphabet, lm: &dyn LanguageModel) -> Self {
        let mut trie = Self {
            nodes: vec![TrieNode::default()],
        };
        let start = lm.start_state();
        for (word_index, word) in lexicon.words().iter().enumerate() {
            let (_, unigram_log_prob) = lm.score(&start, word_index as u32);
            let _ = word; // word string not needed for the trie itself
            for spelling in &word.spellings {
                let node = trie.insert(spelling);
                trie.nodes[node].accepting.push((word_index, unigram_log_prob));
            }
        }
        trie.smear(ROOT);
        trie
    }

    fn insert(&mut self, spelling: &[usize]) -> usize {
        let mut node = ROOT;
        for &token in spelling {
            node = *self.nodes[node].children.entry(token).or_insert_with(|| {
                self.nodes.push(TrieNode::default());
                self.nodes.len() - 1
            });
        }
        node
    }

    pub fn child(&self, node: usize, token: usize) -> Option<usize> {
        self.nodes[node].children.get(&token).copied()
    }

    pub fn accepting(&self, node: usize) -> &[(usize, f32)] {
        &self.nodes[node].accepting
    }

    pub fn max_score(&self, node: usize) -> f32 {
        self.nodes[node].max_score
    }

    pub fn is_root(&self, node: usize) -> bool {
        node == ROOT
    }

    /// Post-order MAX-smear: every node's `max_score` becomes the largest score
    /// reachable among its own acceptances and its children's smeared scores. Leaves
    /// with no acceptance (a dead prefix, never possible from a real lexicon but not
    /// excluded structurally) smear to `f32::NEG_INFINITY` rather than 0, so an empty
    /// subtree never looks attractive to the beam search.
    fn smear(&mut self, node: usize) -> f32 {
        let children: Vec<usize> = self.nodes[node].children.values().copied().collect();
        let mut best = self.nodes[node]
            .accepting
            .iter()
            .map(|&(_, score)| score)
            .fold(f32::NEG_INFINITY, f32::max);
        for child in children {
            let child_best = self.smear(child);
            best = best.max(child_best);
        }
        self.nodes[node].max_score = best;
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bonjour_fixture() -> (Alphabet, Lexicon) {
        let alphabet = Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\n")).unwrap();
        let lexicon = Lexicon::from_reader(Cursor::new("bonjour\tb o z^ u r\n"), &alphabet, None).unwrap();
        (alphabet, lexicon)
    }

    struct FixedUnigram(f32);
    impl LanguageModel for FixedUnigram {
        fn start_state(&self) -> crate::decoder::lm::LmState {
            Default::default()
        }
        fn score(&self, state: &crate::decoder::lm::LmState, _word: u32) -> (crate::decoder::lm::LmState, f32) {
            (state.clone(), self.0)
        }
        fn vocab(&self) -> &[String] {
            &[]
        }
        fn word_index(&self, _word: &str) -> Option<u32> {
            None
        }
    }

    #[test]
    fn single_word_path_smears_uniformly() {
        let (alphabet, lexicon) = bonjour_fixture();
        let lm = FixedUnigram(-8.0);
        let trie = Trie::build(&lexicon, &alphabet, &lm);

        let spelling: Vec<usize> = ["b", "o", "z^", "u", "r"]
            .iter()
            .map(|t| alphabet.token_to_index(t).unwrap())
            .collect();

        let mut node = ROOT;
        for &tok in &spelling {
            assert_eq!(trie.max_score(node), -8.0);
            node = trie.child(node, tok).expect("path should exist");
        }
        assert_eq!(trie.max_score(node), -8.0);
        assert_eq!(trie.accepting(node), &[(0usize, -8.0f32)]);
    }

    #[test]
    fn diverging_prefix_smears_to_the_better_branch() {
        let alphabet = Alphabet::from_reader(Cursor::new("b\no\nn\nt\n")).unwrap();
        let text = "bon\tb o n\nbot\tb o t\n";
        let lexicon = Lexicon::from_reader(Cursor::new(text), &alphabet, None).unwrap();

        struct PerWord;
        impl LanguageModel for PerWord {
            fn start_state(&self) -> crate::decoder::lm::LmState {
                Default::default()
            }
            fn score(&self, state: &crate::decoder::lm::LmState, word: u32) -> (crate::decoder::lm::LmState, f32) {
                (state.clone(), if word == 0 { -1.0 } else { -5.0 })
            }
            fn vocab(&self) -> &[String] {
                &[]
            }
            fn word_index(&self, _word: &str) -> Option<u32> {
                None
            }
        }

        let trie = Trie::build(&lexicon, &alphabet, &PerWord);
        let b = alphabet.token_to_index("b").unwrap();
        let o = alphabet.token_to_index("o").unwrap();
        let node_b = trie.child(ROOT, b).unwrap();
        let node_bo = trie.child(node_b, o).unwrap();
        // "bon" (word 0, score -1.0) beats "bot" (word 1, score -5.0) at the shared prefix.
        assert_eq!(trie.max_score(ROOT), -1.0);
        assert_eq!(trie.max_score(node_b), -1.0);
        assert_eq!(trie.max_score(node_bo), -1.0);
    }
}
