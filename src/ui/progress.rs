use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

pub struct ProgressManager {
    mp: MultiProgress,
    _handle: thread::JoinHandle<()>,
}

impl ProgressManager {
    pub fn new(total_files: usize) -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();

        let parsing = mp.add(ProgressBar::new(total_files as u64).with_message("Parsing files"));
        let parsing = if console::Term::stdout().is_term() {
            parsing
        } else {
            ProgressBar::hidden()
        };

        let validating = mp.add(ProgressBar::new_spinner().with_message("Validating references"));
        let validating = if console::Term::stdout().is_term() {
            validating
        } else {
            ProgressBar::hidden()
        };

        let indexing = mp.add(ProgressBar::new_spinner().with_message("Building indexes"));
        let indexing = if console::Term::stdout().is_term() {
            indexing
        } else {
            ProgressBar::hidden()
        };

        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Progress {
                        phase: ProgressPhase::Parsing,
                        current: _,
                        file,
                    } => {
                        parsing.inc(1);
                        if let Some(ref f) = file {
                            parsing.set_message(format!("Parsing: {}", f));
                        }
                    }
                    ProgressMessage::Started {
                        phase: ProgressPhase::Validating,
                        total: _,
                    } => {
                        validating.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Started {
                        phase: ProgressPhase::Indexing,
                        total: _,
                    } => {
                        indexing.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Parsing,
                    } => {
                        parsing.finish_with_message("Done");
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Validating,
                    } => {
                        validating.finish_with_message("Done");
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Indexing,
                    } => {
                        indexing.finish_with_message("Done");
                    }
                    ProgressMessage::Exit => break,
                    _ => {}
                }
            }
        });

        (Self { mp, _handle: handle }, tx)
    }

    pub fn clear(&self) {
        self.mp.clear().ok();
    }

    pub fn finish_with_summary(
        &self,
        duration: Duration,
        files: usize,
        verses: usize,
        edges: usize,
    ) {
        self.clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}",
            Icons::FILE.style(theme().info.clone()),
            files,
            Icons::BOOK.style(theme().info.clone()),
            verses,
            Icons::LINK.style(theme().info.clone()),
            edges
        );
    }
}
