use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    neuralmatch::cli::run_neuralmatch(std::env::args().skip(1))
}
