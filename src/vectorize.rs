// imports
use crate::corpus::{split_fields, Document};

use std::collections::HashSet;
use ndarray::{Array2, Axis};
use rayon::prelude::*;


/// Binary presence vector of a document against the vocabulary, entry `i` is 1
/// when `word_features[i]` is one of the document's words.
pub fn document_features(word_features: &[String], document_words: &HashSet<String>) -> Vec<u8> {
    word_features
    .iter()
    .map(|word| u8::from(document_words.contains(word)))
    .collect()
}


/// Stacks the feature vectors of all documents, one row per document in corpus
/// order. Rows are computed in parallel on the current rayon pool.
pub fn feature_matrix(word_features: &[String], documents: &[Document]) -> Array2<f32> {

    let mut x_mat: Array2<f32> = Array2::zeros((documents.len(), word_features.len()));
    x_mat
    .axis_iter_mut(Axis(0))
    .into_par_iter()
    .zip(documents.par_iter())
    .for_each(|(mut row, document)| {
        for (j, present) in document_features(word_features, &document.word_set).into_iter().enumerate() {
            row[j] = present as f32;
        }
    });
    x_mat
}


/// Splits raw text the way the corpus reader does and returns its word set.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|x| x.to_string()).collect()
}


/// Text of a document line to classify. A labelled `label<TAB>text` line gives
/// the same text the corpus reader trains on, a line without tab is all text.
pub fn document_text(line: &str) -> &str {
    match split_fields(line) {
        Some((_, text)) => text,
        None => line.trim()
    }
}


/// Feature matrix of unseen document lines, one row per line in order.
pub fn lines_matrix<S: AsRef<str>>(word_features: &[String], lines: &[S]) -> Array2<f32> {

    let mut x_mat: Array2<f32> = Array2::zeros((lines.len(), word_features.len()));
    for (mut row, line) in x_mat.axis_iter_mut(Axis(0)).zip(lines) {
        let words = word_set(document_text(line.as_ref()));
        for (j, present) in document_features(word_features, &words).into_iter().enumerate() {
            row[j] = present as f32;
        }
    }
    x_mat
}
