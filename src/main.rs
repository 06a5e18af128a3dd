use clap::Parser;
use color_eyre::eyre;
use console::style;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Vector core timing simulator", long_about = None)]
struct Options {
    /// Directory containing Config.txt, Code.asm, SDMEM.txt and VDMEM.txt;
    /// register and memory dumps are written back here.
    #[arg(value_name = "IODIR")]
    iodir: PathBuf,

    /// Write aggregate simulation counters to a JSON file.
    #[arg(long = "stats-file", value_name = "PATH")]
    stats_file: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let options = Options::parse();
    let stats = vcoresim::simulate(&options.iodir)?;

    if let Some(path) = &options.stats_file {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &stats)?;
    }

    println!();
    println!("{}", style("================================").dim());
    println!(
        "{}",
        style(format!("TOTAL CYCLES TAKEN: {}", stats.cycles)).bold()
    );
    println!("{}", style("================================").dim());
    Ok(())
}
