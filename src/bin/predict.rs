use std::{error::Error, env, fs::File, io::{self, BufRead}, process};
extern crate chi_boost;
use chi_boost::{files_handling, Booster};
use chi_boost::boost::{argmax_rows, Objective};
use chi_boost::vectorize::lines_matrix;
use log::{error, info};


// classifies new documents with a trained model.
// treated as binary executable so it can be ran independantly from main

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // arguments to this executable should be:
    // path to the trained model (without .bin.gz)
    // path to the feature words (without .txt)
    // path to the documents, one per line, either `text` or `label<TAB>text`
    // example: ... output/model output/words data/new_docs.txt
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        error!("expected arguments: <model> <words> <documents>");
        process::exit(2);
    }

    if let Err(e) = run(&args[1], &args[2], &args[3]) {
        error!("{}", e);
        process::exit(1);
    }
}


fn run(model_path: &str, words_path: &str, input_path: &str) -> Result<(), Box<dyn Error>> {

    let booster = files_handling::read_input::<Booster>(model_path)?;
    let word_features = files_handling::read_input::<Vec<String>>(words_path)?;
    info!("loaded model with {} rounds over {} feature words", booster.num_rounds(), word_features.len());

    booster.check_vocabulary(&word_features)?;

    // labelled corpus lines work too, their label is ignored
    let lines: Vec<String> = io::BufReader::new(File::open(input_path)?)
    .lines()
    .collect::<Result<Vec<String>, io::Error>>()?
    .into_iter()
    .filter(|line| !line.trim().is_empty())
    .collect();
    let x_mat = lines_matrix(&word_features, &lines);

    let probs = booster.predict_proba(&x_mat)?;
    for (i, class) in argmax_rows(&probs).iter().enumerate() {
        match booster.objective() {
            Objective::Softmax => println!("{}\t{}", i, class),
            Objective::Softprob => println!("{}\t{}\t{:?}", i, class, probs.row(i).to_vec()),
        }
    }

    Ok(())
}
