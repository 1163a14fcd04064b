
use crate::error::ConfigError;

use serde_json::Value;
use std::{fs, fmt::Display};


// where the segmented risk corpus lives when no json is given
pub const DEFAULT_CORPUS_FILE: &str = "../data/risk/data_seg.txt";


#[derive(Clone, Debug, PartialEq)]
pub struct JsonTrain {
    pub max_depth: usize,
    pub eta: f32,
    pub eval_metric: String,
    pub objective: String,
    pub num_class: usize,
    pub num_round: usize,
    pub lambda: f32,
    pub min_child_weight: f32,
}

impl Default for JsonTrain {
    fn default() -> Self {
        Self {
            max_depth: 6,
            eta: 0.5,
            eval_metric: "merror".to_string(),
            objective: "multi:softmax".to_string(),
            num_class: 2,
            num_round: 100,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

impl Display for JsonTrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        max_depth: {},
        eta: {},
        eval_metric: {},
        objective: {},
        num_class: {},
        num_round: {},
        lambda: {},
        min_child_weight: {}",
        self.max_depth, self.eta, self.eval_metric, self.objective, self.num_class, self.num_round, self.lambda, self.min_child_weight
        )
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct JsonTypes {
    pub corpus_file: String,
    pub output_dir: String,
    pub corpus_size: usize,
    pub top_k: usize,
    pub test_ratio: f64,
    pub num_threads: usize,
    pub json_train: JsonTrain
}

impl Default for JsonTypes {
    fn default() -> Self {
        Self {
            corpus_file: DEFAULT_CORPUS_FILE.to_string(),
            output_dir: "output".to_string(),
            corpus_size: 4000,
            top_k: 300,
            test_ratio: 0.0,
            num_threads: 4,
            json_train: JsonTrain::default()
        }
    }
}

impl Display for JsonTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using hyper-params:
        corpus_file: {}
        output_dir: {}
        corpus_size: {}
        top_k: {}
        test_ratio: {}
        num_threads: {},
        Using training hyper-params: {}",
        self.corpus_file, self.output_dir, self.corpus_size, self.top_k, self.test_ratio, self.num_threads, self.json_train)
    }
}


fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), expected }
}

fn get_usize(json: &Value, key: &str, default: usize) -> Result<usize, ConfigError> {
    match json.get(key) {
        Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| invalid(key, "a non negative integer")),
        None => Ok(default)
    }
}

fn get_f64(json: &Value, key: &str, default: f64) -> Result<f64, ConfigError> {
    match json.get(key) {
        Some(value) => value.as_f64().ok_or_else(|| invalid(key, "numeric")),
        None => Ok(default)
    }
}

fn get_string(json: &Value, key: &str, default: &str) -> Result<String, ConfigError> {
    match json.get(key) {
        Some(value) => value.as_str().map(|s| s.to_owned()).ok_or_else(|| invalid(key, "a string")),
        None => Ok(default.to_owned())
    }
}


pub struct Config {
    params: JsonTypes
}

impl Config {

    pub fn get_params(&self) -> JsonTypes {
        self.params.clone()
    }

    /// Reads the parameters from the json file given as the only argument, or
    /// falls back to the defaults when the program runs without arguments.
    pub fn new(args: &[String]) -> Result<Config, ConfigError> {

        match args.len() {
            1 => Ok(Self { params: JsonTypes::default() }),
            2 => {
                let f = fs::File::open(&args[1])?;
                let json: Value = serde_json::from_reader(f)?;
                Config::from_json(&json)
            },
            _ => Err(ConfigError::Usage)
        }
    }

    pub fn from_json(json: &Value) -> Result<Config, ConfigError> {

        // every key is optional, missing ones take the defaults
        let defaults = JsonTypes::default();
        let train_defaults = &defaults.json_train;

        let json_train = JsonTrain {
            max_depth: get_usize(json, "max_depth", train_defaults.max_depth)?,
            eta: get_f64(json, "eta", train_defaults.eta as f64)? as f32,
            eval_metric: get_string(json, "eval_metric", &train_defaults.eval_metric)?,
            objective: get_string(json, "objective", &train_defaults.objective)?,
            num_class: get_usize(json, "num_class", train_defaults.num_class)?,
            num_round: get_usize(json, "num_round", train_defaults.num_round)?,
            lambda: get_f64(json, "lambda", train_defaults.lambda as f64)? as f32,
            min_child_weight: get_f64(json, "min_child_weight", train_defaults.min_child_weight as f64)? as f32,
        };

        let params = JsonTypes {
            corpus_file: get_string(json, "corpus_file", &defaults.corpus_file)?,
            output_dir: get_string(json, "output_dir", &defaults.output_dir)?,
            corpus_size: get_usize(json, "corpus_size", defaults.corpus_size)?,
            top_k: get_usize(json, "top_k", defaults.top_k)?,
            test_ratio: get_f64(json, "test_ratio", defaults.test_ratio)?,
            num_threads: get_usize(json, "num_threads", defaults.num_threads)?,
            json_train
        };

        if !(0.0..1.0).contains(&params.test_ratio) {
            return Err(invalid("test_ratio", "within [0, 1)"));
        }
        if params.json_train.num_class < 2 {
            return Err(invalid("num_class", "at least 2"));
        }
        if params.num_threads == 0 {
            return Err(invalid("num_threads", "at least 1"));
        }

        Ok(Self { params })
    }

}


pub mod files_handling {

    use crate::boost::Booster;

    use ndarray::{Array1, Array2};
    use ndarray_npy::{read_npy, write_npy};
    use std::error::Error;
    use std::fs::{self, File};
    use std::io::{BufRead, BufReader, BufWriter, Write};
    use flate2::{Compression, read::GzDecoder, write::GzEncoder};

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<<R as ReadFile>::Item, <R as ReadFile>::Error> {
        let input = <R as ReadFile>::read_file(file_path)?;
        Ok(input)
    }

    pub fn save_output<S: SaveFile>(output_dir: &str, file_name: &str, item: &S) -> Result<(), <S as SaveFile>::Error> {
        item.save_file(output_dir, file_name)
    }

    // `file_path` is given without extension, each type knows its own
    pub trait ReadFile {
        type Error;
        type Item;
        fn read_file(file_path: &str) -> Result<Self::Item, Self::Error>;
    }

    impl ReadFile for Vec<String> {
        type Error = std::io::Error;
        type Item = Self;
        fn read_file(file_path: &str) -> Result<Self::Item, Self::Error> {
            let in_file = file_path.to_string() + ".txt";
            let f = BufReader::new(File::open(in_file)?);
            f.lines().collect()
        }
    }

    impl ReadFile for Array2<f32> {
        type Error = Box<dyn Error>;
        type Item = Self;
        fn read_file(file_path: &str) -> Result<Self::Item, Self::Error> {
            let in_file = file_path.to_string() + ".npy";
            Ok(read_npy(in_file)?)
        }
    }

    impl ReadFile for Booster {
        type Error = Box<dyn Error>;
        type Item = Self;
        fn read_file(file_path: &str) -> Result<Self::Item, Self::Error> {
            let in_file = file_path.to_string() + ".bin.gz";
            let reader = GzDecoder::new(BufReader::new(File::open(in_file)?));
            let item = bincode::deserialize_from(reader)?;
            Ok(item)
        }
    }

    pub trait SaveFile {
        type Error;
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<(), Self::Error>;
    }

    impl SaveFile for Vec<String> {
        type Error = Box<dyn Error>;
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<(), Self::Error> {
            fs::create_dir_all(output_dir)?;
            let out = output_dir.to_string() + "/" + file_name + ".txt";
            let mut f = BufWriter::new(File::create(out)?);
            for word in self {
                writeln!(f, "{}", word)?;
            }
            f.flush()?;
            Ok(())
        }
    }

    impl SaveFile for Array2<f32> {
        type Error = Box<dyn Error>;
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<(), Self::Error> {
            fs::create_dir_all(output_dir)?;
            let out = output_dir.to_string() + "/" + file_name + ".npy";
            write_npy(out, self)?;
            Ok(())
        }
    }

    impl SaveFile for Array1<u32> {
        type Error = Box<dyn Error>;
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<(), Self::Error> {
            fs::create_dir_all(output_dir)?;
            let out = output_dir.to_string() + "/" + file_name + ".npy";
            write_npy(out, self)?;
            Ok(())
        }
    }

    impl SaveFile for Booster {
        type Error = Box<dyn Error>;
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<(), Self::Error> {
            fs::create_dir_all(output_dir)?;
            let out = output_dir.to_string() + "/" + file_name + ".bin.gz";
            let mut writer = GzEncoder::new(BufWriter::new(File::create(out)?), Compression::default());
            bincode::serialize_into(&mut writer, self)?;
            writer.finish()?.flush()?;
            Ok(())
        }
    }


}


#[cfg(test)]
mod tests {

    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_the_risk_corpus_setup() {

        let params = Config::new(&["chi_boost".to_string()]).unwrap().get_params();
        assert_eq!(params.corpus_file, DEFAULT_CORPUS_FILE);
        assert_eq!(params.corpus_size, 4000);
        assert_eq!(params.top_k, 300);
        assert_eq!(params.json_train.max_depth, 6);
        assert_eq!(params.json_train.eta, 0.5);
        assert_eq!(params.json_train.eval_metric, "merror");
        assert_eq!(params.json_train.objective, "multi:softmax");
        assert_eq!(params.json_train.num_round, 100);
    }

    #[test]
    fn json_overrides_defaults() {

        let json = json!({"corpus_file": "data.tsv", "corpus_size": 10, "num_class": 11, "eta": 0.1, "test_ratio": 0.3});
        let params = Config::from_json(&json).unwrap().get_params();
        assert_eq!(params.corpus_file, "data.tsv");
        assert_eq!(params.corpus_size, 10);
        assert_eq!(params.json_train.num_class, 11);
        assert!((params.json_train.eta - 0.1).abs() < 1e-7);
        assert_eq!(params.test_ratio, 0.3);
        assert_eq!(params.top_k, 300);
    }

    #[test]
    fn wrong_types_are_rejected() {

        let json = json!({"corpus_size": "many"});
        match Config::from_json(&json) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "corpus_size"),
            _ => panic!("expected invalid corpus_size"),
        }
        assert!(Config::from_json(&json!({"test_ratio": 1.5})).is_err());
        assert!(Config::from_json(&json!({"num_class": 1})).is_err());
    }

    #[test]
    fn reads_json_file() {

        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, br#"{"output_dir": "out", "top_k": 50}"#).unwrap();
        let args = vec!["chi_boost".to_string(), f.path().to_str().unwrap().to_string()];
        let params = Config::new(&args).unwrap().get_params();
        assert_eq!(params.output_dir, "out");
        assert_eq!(params.top_k, 50);
    }

    #[test]
    fn too_many_arguments() {
        let args = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(matches!(Config::new(&args), Err(ConfigError::Usage)));
    }
}
