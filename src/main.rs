mod cli;
mod cues;
mod db;
mod ids;
mod migrate;
mod mixxx;
mod rekordbox;
mod serato;
mod tags;
mod types;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::run()
}
