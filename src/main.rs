use chi_boost::Pipeline;
use log::error;
use std::process;

// preprocess before running:
// the corpus is expected segmented, one `label<TAB>words` document per line

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = Pipeline::run() {
        error!("{}", e);
        process::exit(1);
    }
}
