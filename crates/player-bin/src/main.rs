use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use player_core::{open_stream, DecoderEngine, PlayerSession};

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Decode frames and report their timestamps without writing output.
    Probe {
        input: String,
        #[arg(long, default_value_t = 120)]
        frames: u64,
    },
    /// Decode frames and write them to a directory as PNG files.
    DumpFrames {
        input: String,
        output_dir: String,
        #[arg(long, default_value_t = 30)]
        count: u64,
        /// Keep every Nth decoded frame.
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
}

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn start_session(input: String) -> PlayerSession {
    PlayerSession::start(move || {
        let (ictx, stream_index) = open_stream(&input)?;
        let engine = DecoderEngine::new(ictx, stream_index)?;
        let info = engine.info();
        Ok((engine, info))
    })
    .expect("Failed to start playback session")
}

fn main() {
    pretty_env_logger::init();
    player_core::init().expect("Failed to initialize FFmpeg");

    let cli = Cli::parse();
    match cli.command {
        Command::Probe { input, frames } => {
            let session = start_session(input);
            let info = session.info().clone();
            log::info!(
                "video {}x{} at {:.2} fps, {} bytes per frame",
                info.width,
                info.height,
                info.fps,
                info.frame_size
            );

            for i in 0..frames {
                let Some(frame) = session.queue().pop() else {
                    log::info!("stream ended after {} frames", i);
                    break;
                };
                println!(
                    "frame {:5}  pts {:9.3}s  {} bytes",
                    i,
                    frame.pts as f64 / 1e6,
                    frame.byte_size()
                );
            }
            session.stop();
        }
        Command::DumpFrames {
            input,
            output_dir,
            count,
            every,
        } => {
            if !Path::new(&output_dir).exists() {
                fs::create_dir_all(&output_dir).expect("Failed to create output directory");
            }

            let session = start_session(input);
            let (width, height) = (session.info().width, session.info().height);

            let mut seen: u64 = 0;
            let mut saved: u64 = 0;
            while saved < count {
                let Some(frame) = session.queue().pop() else {
                    log::info!("stream ended after {} frames", seen);
                    break;
                };
                seen += 1;
                if (seen - 1) % every.max(1) != 0 {
                    continue;
                }

                let img = image::RgbImage::from_raw(width, height, frame.pixels)
                    .expect("Frame buffer has the wrong size");
                let output_path = Path::new(&output_dir).join(format!("{}.png", saved));
                img.save(&output_path).expect("Failed to write PNG file");
                println!("Saved {}", output_path.display());
                saved += 1;
            }
            log::info!("wrote {} of {} decoded frames", saved, seen);
            session.stop();
        }
    }
}
