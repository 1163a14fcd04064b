// imports
use crate::error::CorpusError;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;


pub type ClassLabel = usize;

// the corpus is binary, "disapprove" against everything else
pub const NUM_CLASSES: usize = 2;
const NEGATIVE_TOKEN: &str = "disapprove";


pub fn label_from_token(token: &str) -> ClassLabel {
    if token.trim() == NEGATIVE_TOKEN { 0 } else { 1 }
}


/// Splits a trimmed `label<TAB>text` line into its label token and text.
/// Fields after a second tab are dropped, `None` when there is no tab at all.
pub fn split_fields(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.trim().split('\t');
    let label_token = parts.next().unwrap_or_default();
    let text = parts.next()?;
    Some((label_token, text.trim()))
}


#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub index: usize,
    pub words: Vec<String>,
    pub word_set: HashSet<String>,
    pub label: ClassLabel,
}


/// Two-level table class -> word -> number of documents.
///
/// Holds both the A values (documents of the class containing the word) and the
/// B values (documents outside the class containing the word).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassWordCounts {
    tables: Vec<HashMap<String, usize>>,
}

impl ClassWordCounts {

    pub fn new(num_classes: usize) -> Self {
        Self {
            tables: vec![HashMap::new(); num_classes]
        }
    }

    pub fn num_classes(&self) -> usize {
        self.tables.len()
    }

    /// Count for `word` in `class`, 0 when the word was never recorded there.
    pub fn get(&self, class: ClassLabel, word: &str) -> usize {
        self.tables.get(class).and_then(|t| t.get(word)).copied().unwrap_or(0)
    }

    pub fn class(&self, class: ClassLabel) -> &HashMap<String, usize> {
        &self.tables[class]
    }

    pub fn increment(&mut self, class: ClassLabel, word: &str) {
        let val = self.tables[class].entry(word.to_owned()).or_insert(0);
        *val += 1;
    }

    pub fn insert(&mut self, class: ClassLabel, word: &str, value: usize) {
        self.tables[class].insert(word.to_owned(), value);
    }
}


#[derive(Clone, Debug)]
pub struct Corpus {
    pub a: ClassWordCounts,
    pub tf: Vec<HashMap<String, usize>>,
    pub documents: Vec<Document>,
    pub count: [usize; NUM_CLASSES],
    pub labels: Vec<ClassLabel>,
}

impl Corpus {

    fn empty() -> Self {
        Self {
            a: ClassWordCounts::new(NUM_CLASSES),
            tf: Vec::new(),
            documents: Vec::new(),
            count: [0; NUM_CLASSES],
            labels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn read(file_path: &Path) -> Result<Corpus, CorpusError> {

        if !file_path.exists() {
            return Err(CorpusError::NotFound(file_path.to_path_buf()));
        }
        let f = File::open(file_path)?;
        Corpus::from_reader(BufReader::new(f))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Corpus, CorpusError> {

        // one pass over the lines, every line is one document
        let mut corpus = Corpus::empty();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let (label, text) = Corpus::parse_line(&line, i + 1)?;
            corpus.accumulate(label, text);
        }
        Ok(corpus)
    }

    // `label<TAB>text`, further tab separated fields are ignored
    fn parse_line(line: &str, line_number: usize) -> Result<(ClassLabel, &str), CorpusError> {

        let (label_token, text) = split_fields(line).ok_or(CorpusError::MalformedLine { line_number })?;
        Ok((label_from_token(label_token), text))
    }

    fn accumulate(&mut self, label: ClassLabel, text: &str) {

        let words = Corpus::tokenize(text);
        let word_set: HashSet<String> = words.iter().cloned().collect();

        // A counts documents, not occurrences, hence the set
        for word in &word_set {
            self.a.increment(label, word);
        }

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for word in &words {
            let val = term_counts.entry(word.to_owned()).or_insert(0);
            *val += 1;
        }

        self.count[label] += 1;
        self.tf.push(term_counts);
        self.labels.push(label);
        self.documents.push(Document { index: self.documents.len(), words, word_set, label });
    }
}


// defines the behavior needed for tokenizing a document
pub trait Tokenizer {
    fn tokenize(sequence: &str) -> Vec<String>;
}

impl Tokenizer for Corpus {
    // text is already segmented, split by whitespace and keep punctuation
    fn tokenize(sequence: &str) -> Vec<String> {
        sequence.split_whitespace().map(|x| x.to_string()).collect()
    }
}
