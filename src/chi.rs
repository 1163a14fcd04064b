// imports
use crate::corpus::{ClassLabel, ClassWordCounts, Corpus};
use crate::error::ChiError;

use std::cmp::Ordering;
use std::collections::HashSet;
use log::debug;


/// Derives the B table from A: for every word recorded in a class, the number of
/// documents of all other classes that contain it. Words absent from A[class]
/// are not represented in B[class].
pub fn complement(a: &ClassWordCounts) -> ClassWordCounts {

    let num_classes = a.num_classes();
    let mut b = ClassWordCounts::new(num_classes);
    for class in 0..num_classes {
        for word in a.class(class).keys() {
            let others: usize = (0..num_classes)
            .filter(|kk| *kk != class)
            .map(|kk| a.get(kk, word))
            .sum();
            b.insert(class, word, others);
        }
    }
    b
}


/// CHI score of one word for one class.
///
/// `a` documents of the class contain the word, `b` documents outside it do,
/// `class_count` documents belong to the class and `corpus_size` is N.
/// A word found in every one of the N documents carries no information and
/// scores 0.
pub fn chi_score(a: usize, b: usize, class_count: usize, corpus_size: usize) -> f64 {

    let (a, b) = (a as f64, b as f64);
    let class_count = class_count as f64;
    let n = corpus_size as f64;
    let m = n - class_count;

    let seen = a + b;
    let unseen = n - a - b;
    if seen <= 0.0 || unseen <= 0.0 {
        return 0.0;
    }

    let numerator = (a * (m - b) - (class_count - a) * b).powi(2);
    (n / seen).ln() * numerator / (seen * unseen)
}


pub struct ChiSelector {
    corpus_size: usize,
    top_k: usize,
}

impl ChiSelector {

    pub fn new(corpus_size: usize, top_k: usize) -> Self {
        Self { corpus_size, top_k }
    }

    /// Scores every word recorded for `class` and returns the `top_k` best,
    /// highest score first. Equal scores are ordered by word.
    pub fn rank_class(&self, a: &ClassWordCounts, b: &ClassWordCounts, class: ClassLabel, class_count: usize) -> Vec<(String, f64)> {

        let mut scores: Vec<(String, f64)> = a.class(class)
        .iter()
        .map(|(word, a_val)| {
            let score = chi_score(*a_val, b.get(class, word), class_count, self.corpus_size);
            (word.to_owned(), score)
        })
        .collect();

        scores.sort_by(|x, y| {
            y.1.partial_cmp(&x.1).unwrap_or(Ordering::Equal).then_with(|| x.0.cmp(&y.0))
        });
        scores.truncate(self.top_k);
        scores
    }

    /// Builds the vocabulary: every class's top words in class order, keeping
    /// only the first occurrence of a word.
    pub fn select(&self, a: &ClassWordCounts, b: &ClassWordCounts, count: &[usize]) -> Result<Vec<String>, ChiError> {

        let documents: usize = count.iter().sum();
        if documents > self.corpus_size {
            return Err(ChiError::CorpusTooSmall { corpus_size: self.corpus_size, documents });
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut word_features: Vec<String> = Vec::new();
        for (class, class_count) in count.iter().enumerate() {

            let ranked = self.rank_class(a, b, class, *class_count);
            if let Some((word, score)) = ranked.first() {
                debug!("class {}: {} candidate words, best '{}' with chi {:.4}", class, a.class(class).len(), word, score);
            }

            for (word, _) in ranked {
                if seen.insert(word.clone()) {
                    word_features.push(word);
                }
            }
        }

        Ok(word_features)
    }

    pub fn select_from_corpus(&self, corpus: &Corpus) -> Result<Vec<String>, ChiError> {
        let b = complement(&corpus.a);
        self.select(&corpus.a, &b, &corpus.count)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use std::io::Cursor;

    fn toy_corpus(data: &str) -> Corpus {
        Corpus::from_reader(Cursor::new(data.to_string())).unwrap()
    }

    #[test]
    fn complement_two_line_corpus() {

        let corpus = toy_corpus("disapprove\tfoo bar\napprove\tfoo baz\n");
        let b = complement(&corpus.a);

        assert_eq!(b.class(0).len(), 2);
        assert_eq!(b.get(0, "foo"), 1);
        assert_eq!(b.get(0, "bar"), 0);
        assert!(b.class(0).contains_key("bar"));
        assert!(!b.class(0).contains_key("baz"));

        assert_eq!(b.class(1).len(), 2);
        assert_eq!(b.get(1, "foo"), 1);
        assert_eq!(b.get(1, "baz"), 0);
        assert!(!b.class(1).contains_key("bar"));
    }

    #[test]
    fn complement_excludes_own_class() {

        let corpus = toy_corpus(
            "disapprove\ta b c\ndisapprove\ta b\napprove\ta\napprove\ta c d\napprove\td\n"
        );
        let b = complement(&corpus.a);
        for class in 0..corpus.a.num_classes() {
            for word in corpus.a.class(class).keys() {
                let expected: usize = (0..corpus.a.num_classes())
                .filter(|k| *k != class)
                .map(|k| corpus.a.get(k, word))
                .sum();
                assert_eq!(b.get(class, word), expected);
            }
        }
        assert_eq!(b.get(0, "a"), 2);
        assert_eq!(b.get(1, "a"), 2);
        assert_eq!(b.get(1, "d"), 0);
    }

    #[test]
    fn chi_score_matches_formula() {

        // N = 10, class has 4 documents, 3 of them contain the word, 1 outside does
        let (a, b, count, n) = (3.0_f64, 1.0_f64, 4.0_f64, 10.0_f64);
        let m = n - count;
        let expected = (n / (a + b)).ln() * (a * (m - b) - (count - a) * b).powi(2) / ((a + b) * (n - a - b));
        let score = chi_score(3, 1, 4, 10);
        assert!((score - expected).abs() < 1e-12);
        assert!(score > 0.0);
    }

    #[test]
    fn chi_score_word_in_every_document_is_zero() {
        assert_eq!(chi_score(4, 6, 4, 10), 0.0);
    }

    #[test]
    fn discriminative_words_rank_first() {

        let corpus = toy_corpus(
            "disapprove\tbad common\ndisapprove\tbad common\ndisapprove\tbad\napprove\tgood common\napprove\tgood\napprove\tgood common\n"
        );
        let selector = ChiSelector::new(20, 1);
        let b = complement(&corpus.a);
        let top0 = selector.rank_class(&corpus.a, &b, 0, corpus.count[0]);
        let top1 = selector.rank_class(&corpus.a, &b, 1, corpus.count[1]);
        assert_eq!(top0[0].0, "bad");
        assert_eq!(top1[0].0, "good");

        let vocab = selector.select_from_corpus(&corpus).unwrap();
        assert_eq!(vocab, vec!["bad".to_string(), "good".to_string()]);
    }

    #[test]
    fn vocabulary_is_deduplicated_in_first_seen_order() {

        let corpus = toy_corpus(
            "disapprove\tx y z\ndisapprove\tx y\napprove\tx w\napprove\ty w v\n"
        );
        let selector = ChiSelector::new(100, 300);
        let vocab = selector.select_from_corpus(&corpus).unwrap();

        let unique: HashSet<&String> = vocab.iter().collect();
        assert_eq!(unique.len(), vocab.len());

        // class 0 words come first, class 1 only contributes its new words
        let b = complement(&corpus.a);
        let first: Vec<String> = selector.rank_class(&corpus.a, &b, 0, corpus.count[0])
        .into_iter().map(|(w, _)| w).collect();
        assert_eq!(&vocab[..first.len()], &first[..]);
        assert_eq!(vocab.len(), 5);
        assert!(vocab[first.len()..].iter().all(|w| w == "w" || w == "v"));
    }

    #[test]
    fn top_k_caps_each_class() {

        let corpus = toy_corpus("disapprove\ta b c d e\napprove\tf g h i j\n");
        let selector = ChiSelector::new(100, 2);
        let vocab = selector.select_from_corpus(&corpus).unwrap();
        assert_eq!(vocab.len(), 4);
    }

    #[test]
    fn corpus_larger_than_n_is_rejected() {

        let corpus = toy_corpus("disapprove\ta\napprove\tb\napprove\tc\n");
        let selector = ChiSelector::new(2, 300);
        match selector.select_from_corpus(&corpus) {
            Err(ChiError::CorpusTooSmall { corpus_size, documents }) => {
                assert_eq!(corpus_size, 2);
                assert_eq!(documents, 3);
            },
            other => panic!("expected corpus too small, got {:?}", other),
        }
    }
}
