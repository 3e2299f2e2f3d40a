// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! CLIPMARK command line front end.
//!
//! Opens one video against an annotation file, applies a single operation
//! and exits. Every change is already on disk when the command returns.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clipmark::config::{AppConfig, DEFAULT_CONFIG_FILE};
use clipmark::io::flow;
use clipmark::io::media::{FfprobeProbe, FixedProbe, MediaProbe, StreamInfo};
use clipmark::util::timecode::format_timecode;
use clipmark::{AnnotationStore, ClipId, Direction, Frame, Label, Session, Target, Toggled};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "clipmark", version, about = "Segment and label video clips for review")]
struct Cli {
    /// Configuration file; created with defaults if missing
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Annotation file (.json, or .yaml/.yml)
    #[arg(short, long)]
    annotations: PathBuf,

    /// Video file to review
    video: PathBuf,

    /// Frame count of the video; skips ffprobe
    #[arg(long)]
    frames: Option<Frame>,

    /// Frame rate used together with --frames
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// ffprobe executable used to read frame count and rate
    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,

    /// Keep old annotations even if the video changed since
    #[arg(long, conflicts_with = "reset")]
    force: bool,

    /// Start over if the video changed since it was annotated
    #[arg(long)]
    reset: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the video identity and a summary of its annotations
    Info,
    /// List clips with labels, reasons and keyframes
    Clips,
    /// Insert a break point, or remove it if present
    ToggleBreak { frame: Frame },
    /// Delete clips (START:END) by removing their boundaries
    DeleteClip {
        #[arg(required = true)]
        clips: Vec<ClipId>,
    },
    /// Label clips as accept or reject
    Label {
        label: Label,
        #[arg(long = "clip", required = true)]
        clips: Vec<ClipId>,
        #[arg(long = "reason")]
        reasons: Vec<String>,
    },
    /// Remove the label and reasons of clips
    ClearLabel {
        #[arg(long = "clip", required = true)]
        clips: Vec<ClipId>,
    },
    /// Add a keyframe to a clip, or remove it if present
    Keyframe { clip: ClipId, frame: Frame },
    /// Remove all keyframes of a clip
    ClearKeyframes { clip: ClipId },
    /// Pick keyframes for a clip from a motion data file
    SuggestKeyframes {
        clip: ClipId,
        #[arg(long)]
        motion: PathBuf,
        #[arg(long, default_value_t = 0.2)]
        threshold: f64,
    },
    /// Find the nearest break point or keyframe from a frame
    Navigate {
        target: NavTarget,
        direction: NavDirection,
        from: Frame,
    },
    /// List reasons the current taxonomy no longer offers
    Orphans,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NavTarget {
    Break,
    Keyframe,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NavDirection {
    Prev,
    Next,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_init(&cli.config);
    let mut session = Session::new(config, cli.annotations.clone());
    if !session.config().application.enable_hashsum_validation {
        log::info!("Checksum validation is disabled in {}", cli.config.display());
    }

    let probe: Box<dyn MediaProbe> = match cli.frames {
        Some(frame_count) => Box::new(FixedProbe(StreamInfo {
            frame_count,
            fps: cli.fps,
        })),
        None => Box::new(FfprobeProbe::with_program(cli.ffprobe.clone())),
    };

    let opened = session.open_video(&cli.video, probe.as_ref()).map(|_| ());
    match opened {
        Ok(()) => {}
        Err(e) if e.is_integrity() && cli.force => {
            log::warn!("{}; keeping old annotations", e);
            session.open_video_unchecked(&cli.video, probe.as_ref())?;
        }
        Err(e) if e.is_integrity() && cli.reset => {
            log::warn!("{}; starting over", e);
            session.open_video_fresh(&cli.video, probe.as_ref())?;
        }
        Err(e) if e.is_integrity() => {
            return Err(e).context("re-run with --force to keep the old annotations or --reset to start over");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", cli.video.display()));
        }
    }

    let store = session.current_mut().context("no video open")?;
    run(store, cli.command)
}

fn run(store: &mut AnnotationStore, command: Command) -> Result<()> {
    match command {
        Command::Info => print_info(store),
        Command::Clips => print_clips(store),
        Command::ToggleBreak { frame } => {
            let outcome = store.toggle_break_point(frame)?;
            match outcome {
                Toggled::Inserted => println!("added break point at frame {frame}"),
                Toggled::Removed => println!("removed break point at frame {frame}"),
                Toggled::Unchanged => println!("frame {frame} is the start of the video"),
            }
            print_clips(store);
        }
        Command::DeleteClip { clips } => {
            let deleted = store.delete_clips(&clips)?;
            println!("deleted {deleted} of {} clip(s)", clips.len());
            print_clips(store);
        }
        Command::Label {
            label,
            clips,
            reasons,
        } => {
            store.set_label(&clips, label, &reasons)?;
            println!("labelled {} clip(s) {label}", clips.len());
        }
        Command::ClearLabel { clips } => {
            store.clear_label(&clips)?;
            println!("cleared label of {} clip(s)", clips.len());
        }
        Command::Keyframe { clip, frame } => match store.toggle_keyframe(clip, frame)? {
            Toggled::Removed => println!("removed keyframe {frame} from {clip}"),
            _ => println!("added keyframe {frame} to {clip}"),
        },
        Command::ClearKeyframes { clip } => {
            let removed = store.clear_keyframes(clip)?;
            println!("removed {removed} keyframe(s) from {clip}");
        }
        Command::SuggestKeyframes {
            clip,
            motion,
            threshold,
        } => {
            let data = flow::load(&motion)
                .with_context(|| format!("failed to read motion data {}", motion.display()))?;
            let picked = store.suggest_keyframes(clip, &data, threshold)?;
            println!("picked {picked} keyframe(s) for {clip}");
        }
        Command::Navigate {
            target,
            direction,
            from,
        } => {
            let target = match target {
                NavTarget::Break => Target::BreakPoint,
                NavTarget::Keyframe => Target::Keyframe,
            };
            let direction = match direction {
                NavDirection::Prev => Direction::Previous,
                NavDirection::Next => Direction::Next,
            };
            match store.navigate(target, direction, from) {
                Some(frame) => println!("{frame}"),
                None => println!("none"),
            }
        }
        Command::Orphans => {
            let orphans = store.orphaned_reasons();
            if orphans.is_empty() {
                println!("no orphaned reasons");
            }
            for (clip, reason) in orphans {
                println!("{clip}\t{reason}");
            }
        }
    }
    Ok(())
}

fn print_info(store: &AnnotationStore) {
    let identity = store.identity();
    let clips = store.clips();
    let count = |label| clips.iter().filter(|c| c.label() == Some(label)).count();

    println!("video:       {}", identity.path.display());
    println!("sha256:      {}", identity.checksum);
    println!(
        "frames:      {} @ {:.3} fps ({})",
        identity.frame_count,
        identity.fps,
        format_timecode(identity.frame_count, identity.fps)
    );
    println!("annotations: {}", store.path().display());
    println!(
        "clips:       {} ({} accepted, {} rejected)",
        clips.len(),
        count(Label::Accept),
        count(Label::Reject)
    );
}

fn print_clips(store: &AnnotationStore) {
    let fps = store.identity().fps;
    for (index, clip) in store.clips().iter().enumerate() {
        let label = clip
            .label()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        let keyframes: Vec<String> = clip
            .annotation
            .keyframes
            .iter()
            .map(|k| k.to_string())
            .collect();
        println!(
            "{:>3}  {:<14} {} - {}  {:<6}  [{}]  {{{}}}",
            index + 1,
            clip.id.to_string(),
            format_timecode(clip.id.start, fps),
            format_timecode(clip.id.end, fps),
            label,
            clip.annotation.reasons.join(", "),
            keyframes.join(", ")
        );
    }
}
