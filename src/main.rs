use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use loragw_spectral_scan::{
    args::{convert_filter, Args},
    hal::{loragw_sx1272::Sx1272RxConfig, mcu::Mcu, Hal},
    spectral_scan::{self, conf::SpectralScanConf},
};
use tracing::debug;

fn scan(args: &Args) -> Result<()> {
    let conf = match &args.config {
        Some(path) => SpectralScanConf::from_file(path)?,
        None => SpectralScanConf::default(),
    };
    let params = args.scan_parameters(&conf.scan)?;
    let board = args.board_conf(&conf.board);
    board.check()?;
    debug!(?params, ?board, "INFO: scan configuration");

    let mut hal = Hal::new(Mcu::new(&board.com_path));
    spectral_scan::run(&mut hal, &params, &Sx1272RxConfig::SPECTRAL_SCAN, &mut std::io::stdout().lock())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .with_writer(std::io::stderr)
        .init();

    match scan(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(e=?e, "spectral scan failed");
            println!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
