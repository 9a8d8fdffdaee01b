use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use segfetch::{Config, Progress, RunError, Session, SessionState};
use tokio::fs;
use tokio::task::JoinHandle;

pub async fn run_single_download(url: String, config: Config, state_file: Option<PathBuf>) -> Result<()> {
    println!("Probing {}...", url);
    let session = Session::create(url.clone(), config)
        .await
        .with_context(|| format!("Failed to prepare download of {}", url))?;

    let state_file = state_file.unwrap_or_else(|| default_state_path(&session));
    drive(session, state_file).await
}

pub async fn resume_download(state_file: PathBuf) -> Result<()> {
    let bytes = fs::read(&state_file)
        .await
        .with_context(|| format!("Failed to read session state: {:?}", state_file))?;
    let session = Session::load(&bytes)
        .await
        .with_context(|| format!("Failed to restore session from {:?}", state_file))?;

    println!(
        "Resuming {} ({} of {} already staged)",
        session.metadata().name,
        HumanBytes(session.processed()),
        HumanBytes(session.metadata().size)
    );
    drive(session, state_file).await
}

async fn drive(mut session: Session, state_file: PathBuf) -> Result<()> {
    let interrupt = session.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.interrupt();
        }
    });

    let view = ProgressView::start(&session)?;
    let result = session.run().await;
    view.finish(&result);

    match result {
        Ok(()) => {
            if fs::try_exists(&state_file).await.unwrap_or(false) {
                fs::remove_file(&state_file)
                    .await
                    .with_context(|| format!("Failed to remove stale state file {:?}", state_file))?;
            }
            println!("Saved {}", session.output_path().display());
            Ok(())
        }
        Err(RunError::AlreadyCombined) => {
            println!("{} was already combined", session.output_path().display());
            Ok(())
        }
        Err(err) => {
            save_state(&session, &state_file).await?;
            eprintln!("Download stopped: {}", err);
            eprintln!("Resume with: segfetch --resume {}", state_file.display());
            Err(err.into())
        }
    }
}

async fn save_state(session: &Session, state_file: &Path) -> Result<()> {
    let bytes = session.save().context("Failed to encode session state")?;
    if let Some(parent) = state_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")?;
        }
    }
    fs::write(state_file, bytes)
        .await
        .with_context(|| format!("Failed to write session state: {:?}", state_file))
}

fn default_state_path(session: &Session) -> PathBuf {
    session
        .config()
        .staging_dir
        .join(format!("{}.state.json", session.metadata().name))
}

pub async fn inspect_state(state_file: PathBuf) -> Result<()> {
    let bytes = fs::read(&state_file)
        .await
        .with_context(|| format!("Failed to read session state: {:?}", state_file))?;
    let state = SessionState::from_bytes(&bytes).context("Failed to decode session state")?;

    let processed: u64 = state.parts.iter().map(|p| p.processed).sum();
    println!("URL:      {}", state.url);
    println!("File:     {}", state.config.output_path(&state.metadata.name).display());
    println!("Saved at: {}", state.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Progress: {} / {} | Ranges: {}",
        HumanBytes(processed),
        HumanBytes(state.metadata.size),
        if state.metadata.range_supported { "supported" } else { "unsupported" }
    );
    println!();

    println!("{:<6} {:<27} {:<15} {:<10} {}", "Part", "Range", "Staged", "Progress", "Staging file");
    println!("{:-<6} {:-<27} {:-<15} {:-<10} {:-<20}", "", "", "", "", "");
    for part in &state.parts {
        let percent = part.processed * 100 / part.range().len();
        println!(
            "{:<6} {:<27} {:<15} {:<10} {}",
            part.index,
            format!("{}-{}", part.from, part.to),
            format!("{}", HumanBytes(part.processed)),
            format!("{}%", percent),
            part.staging_path.display()
        );
    }

    Ok(())
}

/// Progress bars fed from the session's counters by a polling task.
struct ProgressView {
    bars: Vec<ProgressBar>,
    counters: Vec<Progress>,
    header: ProgressBar,
    ticker: JoinHandle<()>,
}

impl ProgressView {
    fn start(session: &Session) -> Result<Self> {
        let multi_progress = MultiProgress::new();
        multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        let header = multi_progress.add(ProgressBar::new(0));
        header.set_style(ProgressStyle::default_bar().template("{msg}")?);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}")?
            .progress_chars("=>-");

        let counters = session.progress();
        let bars: Vec<ProgressBar> = counters
            .iter()
            .enumerate()
            .map(|(index, progress)| {
                let bar = multi_progress.add(ProgressBar::new(progress.total()));
                bar.set_style(style.clone());
                bar.set_message(format!("part {}", index));
                bar.set_position(progress.processed());
                bar
            })
            .collect();

        let name = session.metadata().name.clone();
        let size = session.metadata().size;
        let ticker_bars = bars.clone();
        let ticker_counters = counters.clone();
        let ticker_header = header.clone();
        let ticker = tokio::spawn(async move {
            loop {
                let mut done = 0;
                for (bar, progress) in ticker_bars.iter().zip(&ticker_counters) {
                    bar.set_position(progress.processed());
                    done += progress.processed();
                }
                ticker_header.set_message(format!(
                    "{} | Downloaded: {} / {}",
                    name,
                    HumanBytes(done),
                    HumanBytes(size)
                ));
                ticker_header.tick();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        Ok(Self {
            bars,
            counters,
            header,
            ticker,
        })
    }

    fn finish(self, result: &Result<(), RunError>) {
        self.ticker.abort();
        let message = match result {
            Ok(()) => "Completed",
            Err(RunError::Interrupted) => "Interrupted",
            Err(_) => "Failed",
        };
        for (bar, progress) in self.bars.iter().zip(&self.counters) {
            bar.set_position(progress.processed());
            bar.abandon_with_message(message);
        }
        self.header.abandon();
    }
}
