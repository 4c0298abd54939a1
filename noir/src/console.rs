//! Line-oriented console for an investigation.
//!
//! A simple text protocol suited to scripted runs:
//! - Lines starting with `#` are commands (save, load, slots, clues, quit)
//! - Any other non-blank line is the detective's next move
//! - Narrative goes to stdout; diagnostics go to stderr through `tracing`

use noir_core::{
    Clue, Investigation, LoadOutcome, Rejection, Role, SessionError, Turn, TurnOutcome,
};
use std::io::{self, BufRead, Write};

/// Slots shown by `#slots`.
const LISTED_SLOTS: std::ops::RangeInclusive<u32> = 1..=5;

/// A console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Save(u32),
    Load(u32),
    Slots,
    Clues,
    Clue(usize),
    History,
    Help,
    /// A known command with bad arguments.
    Usage(&'static str),
    Unknown(String),
}

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Command(Command),
    Action(&'a str),
}

/// Classify a line of input.
pub fn parse_line(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    let Some(rest) = line.strip_prefix('#') else {
        return Line::Action(line);
    };

    let parts: Vec<&str> = rest.split_whitespace().collect();
    let number = |usage| parts.get(1).and_then(|n| n.parse().ok()).ok_or(usage);

    let command = match parts.first().copied() {
        Some("quit") | Some("exit") => Command::Quit,
        Some("save") => number("#save <slot>").map_or_else(Command::Usage, Command::Save),
        Some("load") => number("#load <slot>").map_or_else(Command::Usage, Command::Load),
        Some("slots") => Command::Slots,
        Some("clues") | Some("board") => Command::Clues,
        Some("clue") => match parts.get(1).and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => Command::Clue(n),
            None => Command::Usage("#clue <number>"),
        },
        Some("history") => Command::History,
        Some("help") => Command::Help,
        other => Command::Unknown(other.unwrap_or_default().to_string()),
    };
    Line::Command(command)
}

/// Run the console until `#quit` or end of input.
pub async fn run_console(investigation: Investigation) -> Result<(), SessionError> {
    let case = investigation.case();
    println!("=== {} ===", case.title);
    println!("Case file: {}", case.id);
    println!("Location: {}", case.location);
    println!();
    print_help();
    println!();
    if let Some(opening) = investigation.last_turn() {
        print_turn(&opening);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        match parse_line(&line) {
            Line::Blank => continue,
            Line::Command(Command::Quit) => {
                println!("Case closed for tonight.");
                break;
            }
            Line::Command(command) => run_command(&investigation, command).await,
            Line::Action(action) => {
                print!("[WAITING]");
                stdout.flush().ok();
                let outcome = investigation.send(action).await;
                print!("\r         \r");
                stdout.flush().ok();
                print_outcome(&outcome);
            }
        }
        stdout.flush().ok();
    }

    Ok(())
}

async fn run_command(investigation: &Investigation, command: Command) {
    match command {
        Command::Save(slot) => match investigation.save(slot).await {
            Ok(receipt) => println!("[SAVED] {}", receipt.message()),
            Err(e) => println!("[ERROR] {e}"),
        },
        Command::Load(slot) => match investigation.load(slot).await {
            Ok(LoadOutcome::Restored(summary)) => {
                println!("[LOADED] Case file #{} retrieved", summary.slot);
                println!(
                    "[STATUS] {} turns, {} clues on the board",
                    summary.turn_count, summary.clue_count
                );
                if let Some(turn) = investigation.last_turn() {
                    print_turn(&turn);
                }
            }
            Ok(LoadOutcome::Empty) => println!("[LOADED] Cabinet #{slot} is empty"),
            Err(e) => println!("[ERROR] {e}"),
        },
        Command::Slots => match investigation.list_slots(LISTED_SLOTS).await {
            Ok(slots) => {
                println!("[SLOTS]");
                for slot in LISTED_SLOTS {
                    match slots.iter().find(|s| s.slot == slot) {
                        Some(s) => println!(
                            "  #{slot}  {}  {}  \"{}\"",
                            format_timestamp(s.timestamp),
                            s.case_id,
                            s.preview
                        ),
                        None => println!("  #{slot}  (empty)"),
                    }
                }
            }
            Err(e) => println!("[ERROR] {e}"),
        },
        Command::Clues => {
            let clues = investigation.clues();
            if clues.is_empty() {
                println!("[BOARD] Nothing pinned yet.");
            } else {
                println!("[BOARD]");
                for (i, clue) in clues.iter().enumerate() {
                    println!("  {}. {} ({})", i + 1, clue.title, clue.kind.label());
                }
            }
        }
        Command::Clue(number) => match investigation.clue(number) {
            Some(clue) => print_clue_detail(&clue),
            None => println!("[ERROR] No clue #{number} on the board"),
        },
        Command::History => {
            for turn in investigation.turns() {
                print_turn(&turn);
            }
        }
        Command::Help => print_help(),
        Command::Usage(usage) => println!("[ERROR] Usage: {usage}"),
        Command::Unknown(name) => {
            println!("[ERROR] Unknown command '#{name}'. Type #help for help.")
        }
        Command::Quit => {}
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed { reply, clues, .. } => {
            print_turn(reply);
            for clue in clues {
                println!("[CLUE] New evidence pinned: {} ({})", clue.title, clue.kind.label());
            }
            if !clues.is_empty() {
                println!();
            }
        }
        TurnOutcome::Aborted { error, .. } => {
            println!("[ERROR] No answer on the line: {error}");
        }
        TurnOutcome::Rejected(Rejection::Busy(_)) => {
            println!("[BUSY] Still working the last lead.");
        }
        TurnOutcome::Rejected(Rejection::EmptyInput) => {}
    }
}

fn print_turn(turn: &Turn) {
    match turn.role {
        Role::Assistant => {
            println!("[ASSISTANT]");
            for para in turn.text.split("\n\n") {
                println!("{para}");
            }
        }
        Role::User => println!("[DETECTIVE] {}", turn.text),
    }
    println!();
}

fn print_clue_detail(clue: &Clue) {
    println!("[CLUE] {}", clue.title);
    println!("  Type: {}", clue.kind.label());
    println!("  Found: {}", format_timestamp(clue.created_at));
    if clue.is_visual() {
        println!("  Image: {}", abbreviate(&clue.content, 80));
    } else if !clue.content.is_empty() {
        println!("  Content: {}", clue.content);
    }
    println!("  Notes: {}", clue.description);
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

/// Data URIs run to megabytes; show the head only.
fn abbreviate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn print_help() {
    println!("Commands:");
    println!("  #save <n>    - Store the case file in cabinet n");
    println!("  #load <n>    - Retrieve the case file from cabinet n");
    println!("  #slots       - List cabinets 1-5");
    println!("  #clues       - Show the evidence board");
    println!("  #clue <n>    - Show one piece of evidence");
    println!("  #history     - Replay the conversation");
    println!("  #help        - Show this help");
    println!("  #quit        - Exit");
    println!("  (anything else is your next move)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(parse_line("   "), Line::Blank);
        assert_eq!(parse_line("  Search the study "), Line::Action("Search the study"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("#quit"), Line::Command(Command::Quit));
        assert_eq!(parse_line("#save 2"), Line::Command(Command::Save(2)));
        assert_eq!(parse_line("#load 12"), Line::Command(Command::Load(12)));
        assert_eq!(parse_line("#clue 3"), Line::Command(Command::Clue(3)));
        assert_eq!(parse_line("#board"), Line::Command(Command::Clues));
    }

    #[test]
    fn test_parse_bad_commands() {
        assert_eq!(
            parse_line("#save"),
            Line::Command(Command::Usage("#save <slot>"))
        );
        assert_eq!(
            parse_line("#load two"),
            Line::Command(Command::Usage("#load <slot>"))
        );
        assert_eq!(
            parse_line("#dance"),
            Line::Command(Command::Unknown("dance".to_string()))
        );
        assert_eq!(parse_line("#"), Line::Command(Command::Unknown(String::new())));
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short", 10), "short");
        assert_eq!(abbreviate("data:image/png;base64,AAAA", 10), "data:image...");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
    }
}
