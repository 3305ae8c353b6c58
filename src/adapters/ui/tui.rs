//! Implements InputPort. Inquire-based interactive menu over the exercise controller.

use crate::adapters::media::SimulatedPlayer;
use crate::domain::{DifficultyLevel, DomainError, Exercise, ExerciseCategory};
use crate::ports::InputPort;
use crate::usecases::playback_monitor::video_path;
use crate::usecases::{ExerciseController, PlaybackMonitor, PlaybackOutcome};
use async_trait::async_trait;
use inquire::{Confirm, CustomType, InquireError, Select, Text};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// New exercises go to the end of the list.
const APPENDED_ORDER_INDEX: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    List,
    Toggle,
    Watch,
    Favorite,
    History,
    Add,
    Delete,
    NewDay,
    Stats,
    Quit,
}

impl MenuItem {
    const ALL: [MenuItem; 10] = [
        MenuItem::List,
        MenuItem::Toggle,
        MenuItem::Watch,
        MenuItem::Favorite,
        MenuItem::History,
        MenuItem::Add,
        MenuItem::Delete,
        MenuItem::NewDay,
        MenuItem::Stats,
        MenuItem::Quit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuItem::List => "List exercises",
            MenuItem::Toggle => "Toggle completion",
            MenuItem::Watch => "Watch video",
            MenuItem::Favorite => "Toggle favorite",
            MenuItem::History => "Progress history",
            MenuItem::Add => "Add exercise",
            MenuItem::Delete => "Delete exercise",
            MenuItem::NewDay => "Start new day",
            MenuItem::Stats => "Statistics",
            MenuItem::Quit => "Quit",
        })
    }
}

fn exercise_line(e: &Exercise) -> String {
    format!(
        "[{}] {}{} ({}, {}) {}s {}x{} - done {}x",
        if e.completed { "x" } else { " " },
        e.title,
        if e.favorite { " *" } else { "" },
        e.category,
        e.difficulty,
        e.duration_seconds,
        e.sets,
        e.repetitions,
        e.completion_count
    )
}

/// Non-negative whole number, surrounding whitespace allowed.
fn parse_count(input: &str) -> Result<u32, ()> {
    input.trim().parse::<u32>().map_err(|_| ())
}

fn input_err(e: InquireError) -> DomainError {
    DomainError::Input(e.to_string())
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    controller: Arc<ExerciseController>,
    playback: PlaybackMonitor,
    media_dir: PathBuf,
    playback_speed: f64,
}

impl TuiInputPort {
    pub fn new(controller: Arc<ExerciseController>, media_dir: PathBuf, playback_speed: f64) -> Self {
        Self {
            playback: PlaybackMonitor::new(Arc::clone(&controller)),
            controller,
            media_dir,
            playback_speed,
        }
    }

    /// Pick one exercise from the current snapshot. `None` when the list is empty.
    fn pick_exercise(&self, prompt: &str) -> Result<Option<Exercise>, DomainError> {
        let mut list = self.controller.snapshot();
        if list.is_empty() {
            println!("No exercises.");
            return Ok(None);
        }
        let options: Vec<String> = list.iter().map(exercise_line).collect();
        let choice = Select::new(prompt, options).raw_prompt().map_err(input_err)?;
        Ok(Some(list.swap_remove(choice.index)))
    }

    /// Re-prompts until the answer is a whole number.
    fn prompt_number(prompt: &str, default: u32) -> Result<u32, DomainError> {
        CustomType::<u32>::new(prompt)
            .with_default(default)
            .with_parser(&parse_count)
            .with_error_message("Enter a whole number (0 or more)")
            .prompt()
            .map_err(input_err)
    }

    fn prompt_new_exercise() -> Result<Option<Exercise>, DomainError> {
        let title = Text::new("Title:").prompt().map_err(input_err)?;
        if title.trim().is_empty() {
            println!("Title is required.");
            return Ok(None);
        }
        let description = Text::new("Description:").prompt().map_err(input_err)?;
        let instructions = Text::new("Instructions:")
            .with_default("Follow the instructions")
            .prompt()
            .map_err(input_err)?;
        let video = Text::new("Video file:")
            .with_default("placeholder")
            .prompt()
            .map_err(input_err)?;
        let category = Select::new("Category:", ExerciseCategory::ALL.to_vec())
            .prompt()
            .map_err(input_err)?;
        let difficulty = Select::new("Difficulty:", DifficultyLevel::ALL.to_vec())
            .prompt()
            .map_err(input_err)?;

        let mut e = Exercise::new(title.trim(), video.trim(), category, difficulty);
        e.description = description;
        e.instructions = instructions;
        e.duration_seconds = Self::prompt_number("Duration (seconds):", 30)?;
        e.repetitions = Self::prompt_number("Repetitions:", 10)?;
        e.sets = Self::prompt_number("Sets:", 3)?;
        e.order_index = APPENDED_ORDER_INDEX;
        Ok(Some(e))
    }

    async fn watch_video(&self, exercise: &Exercise) -> Result<(), DomainError> {
        let path = video_path(&self.media_dir, exercise);
        let player = Arc::new(SimulatedPlayer::open(
            &path,
            Duration::from_secs(u64::from(exercise.duration_seconds)),
            self.playback_speed,
        ));
        println!("Playing {} ...", player.source().display());

        // Any answer, Esc included, stops playback.
        let stop = {
            let player = Arc::clone(&player);
            tokio::task::spawn_blocking(move || {
                let _ = Text::new("Press Enter to stop").prompt();
                player.release();
            })
        };
        let outcome = self.playback.watch(&*player, exercise).await;
        if !matches!(outcome, Ok(PlaybackOutcome::Stopped { .. })) {
            println!("Playback finished. Press Enter to continue.");
        }
        if let Err(e) = stop.await {
            debug!(error = %e, "stop prompt task failed");
        }
        player.release();

        let outcome = outcome?;
        match &outcome {
            PlaybackOutcome::Completed(e) => {
                println!("Done! '{}' completed {} time(s).", e.title, e.completion_count)
            }
            PlaybackOutcome::AlreadyCompleted => println!("Already completed today."),
            PlaybackOutcome::Stopped { watched, .. } => {
                println!("Stopped at {:.0}%", watched * 100.0)
            }
        }

        if let PlaybackOutcome::Stopped {
            can_mark_complete: true,
            ..
        } = outcome
        {
            let mark = Confirm::new(&format!("Mark '{}' as completed?", exercise.title))
                .with_default(true)
                .prompt()
                .map_err(input_err)?;
            if mark {
                match self.playback.mark_watched(exercise, &outcome).await? {
                    Some(e) => println!("'{}' completed {} time(s).", e.title, e.completion_count),
                    None => println!("Already completed today."),
                }
            }
        }
        Ok(())
    }

    async fn print_stats(&self) -> Result<(), DomainError> {
        let percentage = self.controller.completion_percentage().await?;
        let streak = self.controller.streak_days().await?;
        let average = self.controller.average_completion_rate().await?;
        println!("Completed today: {percentage}%");
        println!("Active days (last 30): {streak}");
        println!("Average completions per exercise: {average:.1}");
        Ok(())
    }

    async fn handle(&self, item: MenuItem) -> Result<bool, DomainError> {
        match item {
            MenuItem::List => {
                for e in self.controller.snapshot() {
                    println!("{}", exercise_line(&e));
                }
            }
            MenuItem::Toggle => {
                if let Some(e) = self.pick_exercise("Toggle which exercise?")? {
                    self.controller.toggle_exercise_completion(&e).await?;
                }
            }
            MenuItem::Watch => {
                if let Some(e) = self.pick_exercise("Watch which video?")? {
                    self.watch_video(&e).await?;
                }
            }
            MenuItem::Favorite => {
                if let Some(mut e) = self.pick_exercise("Favorite which exercise?")? {
                    e.favorite = !e.favorite;
                    self.controller.update_exercise(&e).await?;
                }
            }
            MenuItem::History => {
                if let Some(e) = self.pick_exercise("History for which exercise?")? {
                    let log = self
                        .controller
                        .repository()
                        .list_progress_for_exercise(e.id)
                        .await?;
                    if log.is_empty() {
                        println!("No completions recorded.");
                    }
                    for p in log {
                        println!(
                            "{}  {} sets x {} reps",
                            p.completed_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                            p.sets_completed,
                            p.repetitions_completed
                        );
                    }
                }
            }
            MenuItem::Add => {
                if let Some(e) = Self::prompt_new_exercise()? {
                    self.controller.add_exercise(&e).await?;
                }
            }
            MenuItem::Delete => {
                if let Some(e) = self.pick_exercise("Delete which exercise?")? {
                    let sure = Confirm::new(&format!("Delete '{}'?", e.title))
                        .with_default(false)
                        .prompt()
                        .map_err(input_err)?;
                    if sure {
                        self.controller.delete_exercise(&e).await?;
                    }
                }
            }
            MenuItem::NewDay => {
                let cleared = self.controller.start_new_day().await?;
                println!("Cleared {cleared} completed exercise(s).");
            }
            MenuItem::Stats => self.print_stats().await?,
            MenuItem::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let item = match Select::new("What next?", MenuItem::ALL.to_vec()).prompt() {
                Ok(item) => item,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    return Ok(());
                }
                Err(e) => return Err(input_err(e)),
            };
            match self.handle(item).await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                // Esc inside a sub-prompt returns to the menu.
                Err(DomainError::Input(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_line_marks_state() {
        let mut e = Exercise::new(
            "Heel slide",
            "heel_slide",
            ExerciseCategory::Flexibility,
            DifficultyLevel::Medium,
        );
        assert!(exercise_line(&e).starts_with("[ ] Heel slide (FLEXIBILITY, MEDIUM)"));
        e.completed = true;
        e.favorite = true;
        e.completion_count = 2;
        let line = exercise_line(&e);
        assert!(line.starts_with("[x] Heel slide *"));
        assert!(line.ends_with("30s 3x10 - done 2x"));
    }

    #[test]
    fn test_parse_count_rejects_non_numbers() {
        assert_eq!(parse_count(" 12 "), Ok(12));
        assert_eq!(parse_count("0"), Ok(0));
        assert!(parse_count("abc").is_err());
        assert!(parse_count("-5").is_err());
        assert!(parse_count("2.5").is_err());
        assert!(parse_count("").is_err());
    }
}
