use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read, Write};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::Board;
use crate::model::{preview, Letter, LetterKind, RecordId};
use crate::reveal::{IntervalScheduler, RevealState, Scheduler};
use crate::storage::RecordStore;

const SHORT_ID_LEN: usize = 8;

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive text matched against title, date and body
    #[arg(long, short)]
    pub query: Option<String>,
    /// Only show favorites
    #[arg(long)]
    pub favorites: bool,
    /// Show the trash instead of the board
    #[arg(long)]
    pub trash: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the letter (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Date shown on the card; defaults to today
    #[arg(long)]
    pub date: Option<String>,
    /// Create a sealed envelope (no comment thread)
    #[arg(long)]
    pub envelope: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Letter id or a unique prefix of it
    pub id: String,
    /// Print the body at once instead of typing it out
    #[arg(long)]
    pub instant: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Letter id or a unique prefix of it
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Letter id or a unique prefix of it
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Letter id or a unique prefix of it
    #[arg(required_unless_present = "all")]
    pub id: Option<String>,
    /// Restore everything in the trash
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    /// Letter id or a unique prefix of it
    pub id: String,
    /// Comment text
    pub text: String,
    /// Name shown next to the comment
    #[arg(long)]
    pub author: Option<String>,
}

pub fn list_letters<S, C>(board: &mut Board<S, C>, args: ListArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    board.set_query(args.query.unwrap_or_default());
    board.set_favorites_only(args.favorites);
    let letters = if args.trash {
        board.trashed_letters()
    } else {
        board.visible_letters()
    };
    if letters.is_empty() && board.filter().is_active() {
        println!("No letters match the filter.");
        return Ok(());
    }
    print!(
        "{}",
        format_letters(&letters, board.config().board.preview_lines, args.trash)
    );
    Ok(())
}

fn format_letters(letters: &[&Letter], preview_lines: usize, trash: bool) -> String {
    if letters.is_empty() {
        return if trash {
            "Trash is empty.\n".to_string()
        } else {
            "No letters found.\n".to_string()
        };
    }
    let mut out = String::new();
    for letter in letters {
        let mut headline = format!("{}  {}", short_id(&letter.id), letter.title);
        if !letter.date.is_empty() {
            let _ = write!(&mut headline, "  {}", letter.date);
        }
        if letter.favorite {
            headline.push_str("  [FAV]");
        }
        if letter.kind == LetterKind::Envelope {
            headline.push_str("  [ENVELOPE]");
        }
        let _ = writeln!(&mut out, "{headline}");
        let snippet = preview(&letter.body, preview_lines);
        if !snippet.is_empty() {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    out
}

pub fn new_letter<S, C>(board: &mut Board<S, C>, args: NewArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let title = match args.title {
        Some(title) => title,
        None => prompt("Title")?,
    };
    let body = match args.body {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let form = board.compose_mut();
    form.kind = if args.envelope {
        LetterKind::Envelope
    } else {
        LetterKind::Letter
    };
    form.title = title;
    form.body = body;
    form.date = args.date.unwrap_or_default();

    let Some(id) = board.submit_compose().context("creating letter")? else {
        match board.compose().feedback {
            Some(problem) => bail!("{problem}"),
            None => bail!("letter was not created"),
        }
    };
    println!("Created letter {}", short_id(&id));
    Ok(())
}

/// Opens the letter and types its body out on the wall-clock scheduler.
pub fn show_letter<S>(board: &mut Board<S, IntervalScheduler>, args: ShowArgs) -> Result<()>
where
    S: RecordStore,
{
    let id = resolve_id(board, &args.id)?;
    board.open(&id).context("opening letter")?;
    let Some(letter) = board.modal().open_letter().cloned() else {
        bail!("letter {} could not be opened", short_id(&id));
    };

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", letter.title)?;
    if !letter.date.is_empty() {
        writeln!(stdout, "{}", letter.date)?;
    }
    writeln!(stdout)?;

    if args.instant {
        writeln!(stdout, "{}", letter.body)?;
    } else {
        type_out(board, &mut stdout)?;
        writeln!(stdout)?;
    }

    board.pump();
    if letter.kind.supports_comments() {
        let comments = board.modal().comments();
        writeln!(stdout)?;
        if comments.is_empty() {
            writeln!(stdout, "(no comments)")?;
        }
        for comment in comments {
            writeln!(stdout, "- {}: {}", comment.author, comment.text)?;
        }
    }
    if let Some(fault) = board.modal().fault() {
        tracing::warn!(error = %fault.error, "comments may be incomplete");
    }
    board.close();
    Ok(())
}

fn type_out<S, W>(board: &mut Board<S, IntervalScheduler>, out: &mut W) -> Result<()>
where
    S: RecordStore,
    W: Write,
{
    let mut printed = 0;
    while matches!(board.modal().reveal_state(), RevealState::Revealing { .. }) {
        let Some(deadline) = board.scheduler().next_deadline() else {
            break;
        };
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        for timer in board.scheduler_mut().due(Instant::now()) {
            if board.fire_timer(timer) {
                let revealed = board.modal().revealed();
                out.write_all(revealed[printed..].as_bytes())?;
                out.flush()?;
                printed = revealed.len();
            }
        }
    }
    Ok(())
}

pub fn edit_letter<S, C>(board: &mut Board<S, C>, args: EditArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    if args.title.is_none() && args.date.is_none() && args.body.is_none() {
        bail!("nothing to change: pass --title, --date or --body");
    }
    let id = resolve_id(board, &args.id)?;
    board.open(&id).context("opening letter")?;
    board.enter_edit();
    if let Some(drafts) = board.drafts_mut() {
        if let Some(title) = args.title {
            drafts.title = title;
        }
        if let Some(date) = args.date {
            drafts.date = date;
        }
        if let Some(body) = args.body {
            drafts.body = body;
        }
    }
    let saved = board.save_edit().context("saving letter");
    board.close();
    saved?;
    println!("Updated letter {}", short_id(&id));
    Ok(())
}

pub fn toggle_favorite<S, C>(board: &mut Board<S, C>, args: IdArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let id = resolve_id(board, &args.id)?;
    let favorite = board.toggle_favorite(&id).context("toggling favorite")?;
    println!(
        "Letter {} {}",
        short_id(&id),
        if favorite { "marked as favorite" } else { "no longer a favorite" }
    );
    Ok(())
}

pub fn trash_letter<S, C>(board: &mut Board<S, C>, args: IdArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let id = resolve_id(board, &args.id)?;
    board.trash(&id).context("moving letter to trash")?;
    println!("Moved letter {} to the trash", short_id(&id));
    Ok(())
}

pub fn restore_letters<S, C>(board: &mut Board<S, C>, args: RestoreArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    if args.all {
        let restored = board.restore_all().context("restoring trash")?;
        println!("Restored {restored} letter(s)");
        return Ok(());
    }
    let Some(prefix) = args.id else {
        bail!("pass a letter id or --all");
    };
    let id = resolve_id(board, &prefix)?;
    board.restore(&id).context("restoring letter")?;
    println!("Restored letter {}", short_id(&id));
    Ok(())
}

pub fn destroy_letter<S, C>(board: &mut Board<S, C>, args: IdArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let id = resolve_id(board, &args.id)?;
    let comments = board.destroy(&id).context("destroying letter")?;
    println!(
        "Destroyed letter {} and {comments} comment(s)",
        short_id(&id)
    );
    Ok(())
}

pub fn empty_trash<S, C>(board: &mut Board<S, C>) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let destroyed = board.empty_trash().context("emptying trash")?;
    println!("Destroyed {destroyed} letter(s)");
    Ok(())
}

pub fn add_comment<S, C>(board: &mut Board<S, C>, args: CommentArgs) -> Result<()>
where
    S: RecordStore,
    C: Scheduler,
{
    let id = resolve_id(board, &args.id)?;
    if board.letter(&id).is_some_and(|letter| !letter.kind.supports_comments()) {
        bail!("letter {} is an envelope and takes no comments", short_id(&id));
    }
    board.open(&id).context("opening letter")?;
    let composer = board.comment_composer_mut();
    composer.author = args.author.unwrap_or_default();
    composer.text = args.text;
    let added = board.add_comment().context("adding comment");
    let feedback = board.modal().composer().feedback;
    board.close();
    match added? {
        Some(_) => println!("Added comment to letter {}", short_id(&id)),
        None => bail!(
            "{}",
            feedback.map_or_else(|| "comment was not added".to_string(), |f| f.to_string())
        ),
    }
    Ok(())
}

/// Accepts a full id or a unique prefix of one.
fn resolve_id<S, C>(board: &Board<S, C>, input: &str) -> Result<RecordId>
where
    S: RecordStore,
    C: Scheduler,
{
    let needle = input.trim();
    if needle.is_empty() {
        bail!("letter id cannot be empty");
    }
    let matches: Vec<&Letter> = board
        .letters()
        .iter()
        .filter(|letter| letter.id.as_str().starts_with(needle))
        .collect();
    if let Some(exact) = matches.iter().find(|letter| letter.id.as_str() == needle) {
        return Ok(exact.id.clone());
    }
    match matches.as_slice() {
        [] => bail!("no letter matches '{needle}'"),
        [only] => Ok(only.id.clone()),
        _ => bail!("'{needle}' matches {} letters; use a longer prefix", matches.len()),
    }
}

fn short_id(id: &RecordId) -> &str {
    let raw = id.as_str();
    raw.get(..SHORT_ID_LEN).unwrap_or(raw)
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::model::NewLetter;
    use crate::reveal::ManualScheduler;
    use crate::storage::MemoryStore;

    type TestResult<T = ()> = Result<T>;

    fn board_with(titles: &[&str]) -> TestResult<(Board<MemoryStore, ManualScheduler>, Vec<RecordId>)> {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for title in titles {
            ids.push(store.create_letter(NewLetter {
                kind: LetterKind::Letter,
                title: (*title).into(),
                date: "2025-10-03".into(),
                body: format!("{title} body"),
            })?);
        }
        let mut board = Board::new(Arc::new(AppConfig::default()), store, ManualScheduler::new());
        board.connect()?;
        Ok((board, ids))
    }

    #[test]
    fn list_format_marks_favorites_and_envelopes() {
        let favorite = Letter {
            id: RecordId::from("a1b2c3d4-0000-4000-8000-000000000000"),
            title: "hi".into(),
            date: "2025-10-03".into(),
            body: "hello\nworld".into(),
            favorite: true,
            ..Letter::default()
        };
        let envelope = Letter {
            id: RecordId::from("ffff0000-1111-4000-8000-000000000000"),
            kind: LetterKind::Envelope,
            title: "sealed".into(),
            ..Letter::default()
        };
        let output = format_letters(&[&favorite, &envelope], 3, false);
        insta::assert_snapshot!(output.trim_end(), @r"
        a1b2c3d4  hi  2025-10-03  [FAV]
            hello world

        ffff0000  sealed  [ENVELOPE]
        ");
    }

    #[test]
    fn empty_views_say_so() {
        assert_eq!(format_letters(&[], 3, false), "No letters found.\n");
        assert_eq!(format_letters(&[], 3, true), "Trash is empty.\n");
    }

    #[test]
    fn ids_resolve_by_unique_prefix() -> TestResult {
        let (board, ids) = board_with(&["one", "two"])?;
        let full = ids[0].as_str();
        assert_eq!(resolve_id(&board, full)?, ids[0]);
        assert_eq!(resolve_id(&board, &full[..SHORT_ID_LEN])?, ids[0]);
        assert!(resolve_id(&board, "").is_err());
        assert!(resolve_id(&board, "not-an-id").is_err());
        Ok(())
    }

    #[test]
    fn edit_applies_only_given_fields() -> TestResult {
        let (mut board, ids) = board_with(&["one"])?;
        edit_letter(
            &mut board,
            EditArgs {
                id: ids[0].to_string(),
                title: None,
                date: None,
                body: Some("  rewritten  ".into()),
            },
        )?;
        let stored = board.store().letter(&ids[0]).expect("letter present");
        assert_eq!(stored.title, "one");
        assert_eq!(stored.body, "rewritten");
        assert!(!board.modal().is_open());
        Ok(())
    }

    #[test]
    fn comment_command_uses_placeholder_author() -> TestResult {
        let (mut board, ids) = board_with(&["one"])?;
        add_comment(
            &mut board,
            CommentArgs {
                id: ids[0].to_string(),
                text: "hey".into(),
                author: None,
            },
        )?;
        let comments = board.store().comments_for(&ids[0]);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, "someone");
        assert_eq!(board.store().live_subscriptions(), 1, "only the letters stream stays");
        Ok(())
    }

    #[test]
    fn restore_all_empties_the_trash_view() -> TestResult {
        let (mut board, ids) = board_with(&["one", "two"])?;
        for id in &ids {
            trash_letter(&mut board, IdArgs { id: id.to_string() })?;
        }
        assert_eq!(board.trashed_letters().len(), 2);
        restore_letters(&mut board, RestoreArgs { id: None, all: true })?;
        assert!(board.trashed_letters().is_empty());
        assert_eq!(board.visible_letters().len(), 2);
        Ok(())
    }
}
