

// imports
use crate::boost::{merror, Booster};
use crate::chi::ChiSelector;
use crate::config::{files_handling, Config, JsonTypes};
use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::vectorize::feature_matrix;

use std::env;
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use rayon::ThreadPoolBuilder;


pub struct Outcome {
    pub word_features: Vec<String>,
    pub booster: Booster,
    pub train_error: f64,
    pub holdout_error: Option<f64>,
}


/// Splits document indexes into a training part and a held out part of
/// `test_ratio` of the corpus. Both parts keep corpus order.
pub fn holdout_split<R: Rng>(n: usize, test_ratio: f64, rng: &mut R) -> (Vec<usize>, Vec<usize>) {

    let n_test = ((n as f64) * test_ratio).round() as usize;
    let n_test = n_test.min(n.saturating_sub(1));
    if n_test == 0 {
        return ((0..n).collect(), Vec::new());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let mut test = order.split_off(n - n_test);
    order.sort_unstable();
    test.sort_unstable();
    (order, test)
}


pub struct Pipeline {}

impl Pipeline {

    // runs the main procedure -
    // -> configuration of arguments
    // -> corpus reading and CHI feature selection
    // -> vectorization
    // -> training

    pub fn run() -> Result<(), Box<dyn Error>> {

        info!("entering program...");
        let args: Vec<String> = env::args().collect();

        info!("building parameters...");
        let params = Config::new(&args)?.get_params();
        info!("{}", params);

        ThreadPoolBuilder::new().num_threads(params.num_threads).build_global()?;

        if let Some(outcome) = Pipeline::execute(&params)? {
            info!("finished, train-merror {:.6}{}", outcome.train_error,
                outcome.holdout_error.map(|e| format!(", holdout-merror {:.6}", e)).unwrap_or_default());
        }
        Ok(())
    }

    /// Runs every stage with the given parameters and saves the artifacts to
    /// `output_dir`. Returns `None` when the corpus file does not exist.
    pub fn execute(params: &JsonTypes) -> Result<Option<Outcome>, Box<dyn Error>> {

        let timer = Instant::now();
        info!("reading corpus {}...", params.corpus_file);
        let corpus = match Corpus::read(Path::new(&params.corpus_file)) {
            Ok(corpus) => corpus,
            Err(CorpusError::NotFound(_)) => {
                warn!("file not exists.");
                return Ok(None);
            },
            Err(e) => return Err(e.into())
        };
        info!("finished reading data, {} documents ({} disapprove / {} other), took {} ms",
            corpus.len(), corpus.count[0], corpus.count[1], timer.elapsed().as_millis());

        // feature selection
        let timer = Instant::now();
        info!("starting feature word selection...");
        let selector = ChiSelector::new(params.corpus_size, params.top_k);
        let word_features = selector.select_from_corpus(&corpus)?;
        for word in &word_features {
            println!("{}", word);
        }
        println!("{}", word_features.len());
        info!("selected {} feature words, took {} ms", word_features.len(), timer.elapsed().as_millis());

        // vectorization
        let timer = Instant::now();
        info!("starting document feature vectors...");
        let x_mat: Array2<f32> = feature_matrix(&word_features, &corpus.documents);
        info!("feature matrix {:?}, took {} ms", x_mat.dim(), timer.elapsed().as_millis());

        // training, optionally against a held out part of the corpus
        let timer = Instant::now();
        let (train_idx, test_idx) = holdout_split(corpus.len(), params.test_ratio, &mut thread_rng());
        let train_x = x_mat.select(Axis(0), &train_idx);
        let train_y: Vec<usize> = train_idx.iter().map(|i| corpus.labels[*i]).collect();
        let test_x = x_mat.select(Axis(0), &test_idx);
        let test_y: Vec<usize> = test_idx.iter().map(|i| corpus.labels[*i]).collect();
        let holdout = if test_idx.is_empty() { None } else { Some((&test_x, test_y.as_slice())) };

        info!("starting training part on {} documents, {} held out...", train_idx.len(), test_idx.len());
        info!("{}", params.json_train);
        let booster = Booster::train(&train_x, &train_y, &params.json_train, holdout)?;
        info!("finished training, took {} seconds ...", timer.elapsed().as_secs());

        let train_error = merror(&booster.predict_proba(&train_x)?, &train_y);
        let holdout_error = match holdout {
            Some((h_mat, h_labels)) => Some(merror(&booster.predict_proba(h_mat)?, h_labels)),
            None => None
        };

        // save the vocabulary, the vectors and the model
        let labels: Array1<u32> = corpus.labels.iter().map(|l| *l as u32).collect();
        files_handling::save_output(&params.output_dir, "words", &word_features)?;
        files_handling::save_output(&params.output_dir, "features", &x_mat)?;
        files_handling::save_output(&params.output_dir, "labels", &labels)?;
        files_handling::save_output(&params.output_dir, "model", &booster)?;
        info!("saved words, features, labels and model to {}", params.output_dir);

        Ok(Some(Outcome { word_features, booster, train_error, holdout_error }))
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::JsonTrain;
    use crate::vectorize::lines_matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::io::Write;

    #[test]
    fn split_without_ratio_keeps_everything() {

        let (train, test) = holdout_split(5, 0.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(train, vec![0, 1, 2, 3, 4]);
        assert!(test.is_empty());
    }

    #[test]
    fn split_partitions_indexes() {

        let (train, test) = holdout_split(10, 0.3, &mut StdRng::seed_from_u64(7));
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);
        let all: HashSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all.len(), 10);
        assert!(train.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn split_never_empties_training() {
        let (train, test) = holdout_split(2, 0.9, &mut StdRng::seed_from_u64(1));
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn missing_corpus_stops_early() {

        let dir = tempfile::tempdir().unwrap();
        let params = JsonTypes {
            corpus_file: dir.path().join("missing.txt").to_str().unwrap().to_string(),
            output_dir: dir.path().join("out").to_str().unwrap().to_string(),
            ..JsonTypes::default()
        };
        assert!(Pipeline::execute(&params).unwrap().is_none());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn end_to_end_on_small_corpus() {

        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("data_seg.txt");
        let mut f = std::fs::File::create(&corpus_path).unwrap();
        for i in 0..20 {
            writeln!(f, "disapprove\t逾期 催收 记录{}", i).unwrap();
            writeln!(f, "approve\t按时 还款 记录{}", i).unwrap();
        }
        drop(f);

        let out = dir.path().join("out");
        let params = JsonTypes {
            corpus_file: corpus_path.to_str().unwrap().to_string(),
            output_dir: out.to_str().unwrap().to_string(),
            corpus_size: 4000,
            top_k: 5,
            json_train: JsonTrain { num_round: 5, ..JsonTrain::default() },
            ..JsonTypes::default()
        };

        let outcome = Pipeline::execute(&params).unwrap().unwrap();
        assert!(outcome.word_features.len() <= 10);
        assert!(outcome.word_features.contains(&"逾期".to_string()));
        assert!(outcome.word_features.contains(&"还款".to_string()));
        assert_eq!(outcome.train_error, 0.0);
        assert!(outcome.holdout_error.is_none());

        for file in ["words.txt", "features.npy", "labels.npy", "model.bin.gz"] {
            assert!(out.join(file).exists(), "{} was not saved", file);
        }
        let x_mat = files_handling::read_input::<Array2<f32>>(out.join("features").to_str().unwrap()).unwrap();
        assert_eq!(x_mat.dim(), (40, outcome.word_features.len()));
        // saved model and words classify new lines, labelled or not
        let booster = files_handling::read_input::<Booster>(out.join("model").to_str().unwrap()).unwrap();
        let words = files_handling::read_input::<Vec<String>>(out.join("words").to_str().unwrap()).unwrap();
        assert_eq!(words, outcome.word_features);
        booster.check_vocabulary(&words).unwrap();

        let lines = ["逾期 催收", "approve\t按时 还款\t逾期 催收"];
        let new_x = lines_matrix(&words, &lines);
        assert_eq!(booster.predict(&new_x).unwrap(), vec![0, 1]);
    }
}
