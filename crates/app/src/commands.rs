use std::error::Error;
use std::io::{BufRead, Write};

use cc_core::model::{Category, QuestionWithCategory, SelectionSet};
use services::session_gate::HOME_PATH;
use services::{
    AppServices, CardDeck, CategoryPicker, RequestContext, RouteDecision, ServiceError,
    guard_request,
};

use crate::args::Command;

type CommandResult = Result<(), Box<dyn Error>>;

fn context() -> RequestContext {
    RequestContext::for_path(HOME_PATH)
}

fn ensure_signed_in(services: &AppServices, ctx: &RequestContext) -> Result<(), ServiceError> {
    match guard_request(services.gate().as_ref(), ctx) {
        RouteDecision::Proceed => Ok(()),
        RouteDecision::Redirect(_) => Err(ServiceError::Unauthenticated),
    }
}

fn print_question(out: &mut impl Write, n: usize, q: &QuestionWithCategory) -> std::io::Result<()> {
    writeln!(out, "{n:>3}. [{}] {}", q.category_name(), q.text())?;
    writeln!(out, "     {}", q.id())
}

/// Run one non-interactive command or the interactive browser.
pub async fn run_command(
    services: &AppServices,
    command: &Command,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> CommandResult {
    let ctx = context();
    ensure_signed_in(services, &ctx)?;

    match command {
        Command::Categories => {
            let categories = services.catalog().list_categories(&ctx).await?;
            if categories.is_empty() {
                writeln!(out, "No categories yet.")?;
            }
            for category in &categories {
                write_category(out, category)?;
            }
        }
        Command::Deal { categories, random } => {
            let selection = if categories.is_empty() || *random {
                let mut picker = CategoryPicker::new(services.catalog().list_categories(&ctx).await?);
                if *random {
                    picker.choose_random();
                }
                picker.start()?
            } else {
                SelectionSet::new(categories.iter().copied())?
            };
            let dealt = services
                .selection()
                .get_incomplete_questions(&ctx, &selection)
                .await?;
            if dealt.is_empty() {
                writeln!(out, "All done: no questions left in this selection.")?;
            }
            for (idx, question) in dealt.iter().enumerate() {
                print_question(out, idx + 1, question)?;
            }
        }
        Command::Complete(id) => {
            services
                .completions()
                .set_question_completion(&ctx, *id, true)
                .await?;
            writeln!(out, "Marked {id} complete.")?;
        }
        Command::Reopen(id) => {
            services
                .completions()
                .set_question_completion(&ctx, *id, false)
                .await?;
            writeln!(out, "Marked {id} incomplete.")?;
        }
        Command::Completed => {
            let completed = services.completions().list_completed_questions(&ctx).await?;
            if completed.is_empty() {
                writeln!(out, "Nothing completed yet.")?;
            }
            for (idx, question) in completed.iter().enumerate() {
                print_question(out, idx + 1, question)?;
            }
        }
        Command::Browse => browse(services, &ctx, input, out).await?,
    }
    Ok(())
}

fn write_category(out: &mut impl Write, category: &Category) -> std::io::Result<()> {
    match category.description() {
        Some(description) => writeln!(out, "{}  {} - {description}", category.id(), category.name()),
        None => writeln!(out, "{}  {}", category.id(), category.name()),
    }
}

fn read_line(input: &mut impl BufRead) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

fn show_picker(out: &mut impl Write, picker: &CategoryPicker) -> std::io::Result<()> {
    writeln!(out)?;
    for (idx, category) in picker.categories().iter().enumerate() {
        let mark = if picker.is_picked(category.id()) { 'x' } else { ' ' };
        writeln!(out, "  [{mark}] {}. {}", idx + 1, category.name())?;
    }
    let random = if picker.is_random() { 'x' } else { ' ' };
    writeln!(out, "  [{random}] r. Random (all categories)")?;
    write!(out, "number to toggle, r random, a all, enter to start, q quit> ")?;
    out.flush()
}

/// Returns `None` when the user quits before starting.
fn pick_categories(
    picker: &mut CategoryPicker,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Option<SelectionSet>, Box<dyn Error>> {
    loop {
        show_picker(out, picker)?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        match line.as_str() {
            "" => match picker.start() {
                Ok(selection) => return Ok(Some(selection)),
                Err(err) => writeln!(out, "{err}")?,
            },
            "q" => return Ok(None),
            "r" => picker.choose_random(),
            "a" => picker.pick_all(),
            raw => {
                let chosen = raw
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| picker.categories().get(idx))
                    .map(Category::id);
                match chosen {
                    Some(id) => {
                        picker.toggle(id);
                    }
                    None => writeln!(out, "unknown choice: {raw}")?,
                }
            }
        }
    }
}

fn show_card(out: &mut impl Write, deck: &CardDeck) -> std::io::Result<()> {
    let (Some(card), Some(progress)) = (deck.current(), deck.progress()) else {
        return Ok(());
    };
    let done = if card.completed { " (completed)" } else { "" };
    writeln!(out)?;
    writeln!(
        out,
        "{} of {} [{}]{done}",
        progress.position,
        progress.total,
        card.question.category_name()
    )?;
    writeln!(out, "  {}", card.question.text())?;
    write!(out, "n next, p previous, c toggle complete, q quit> ")?;
    out.flush()
}

async fn browse(
    services: &AppServices,
    ctx: &RequestContext,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> CommandResult {
    let categories = services.catalog().list_categories(ctx).await?;
    if categories.is_empty() {
        writeln!(out, "No categories yet.")?;
        return Ok(());
    }
    let mut picker = CategoryPicker::new(categories);
    let Some(selection) = pick_categories(&mut picker, input, out)? else {
        return Ok(());
    };

    let dealt = services
        .selection()
        .get_incomplete_questions(ctx, &selection)
        .await?;
    let mut deck = CardDeck::new(dealt);
    if deck.is_empty() {
        writeln!(out, "All done: no questions left in this selection.")?;
        return Ok(());
    }

    let tracker = services.completions();
    loop {
        show_card(out, &deck)?;
        let Some(line) = read_line(input)? else {
            break;
        };
        match line.as_str() {
            "n" | "" => {
                if !deck.next() {
                    writeln!(out, "That was the last card.")?;
                }
            }
            "p" => {
                if !deck.previous() {
                    writeln!(out, "Already at the first card.")?;
                }
            }
            "c" => match deck.toggle_current(&tracker, ctx).await {
                Ok(true) => writeln!(out, "Marked complete.")?,
                Ok(false) => writeln!(out, "Marked incomplete.")?,
                Err(err) if err.is_upstream() => {
                    writeln!(out, "Could not save: {err}. Try again.")?;
                }
                Err(err) => return Err(err.into()),
            },
            "q" => break,
            other => writeln!(out, "unknown key: {other}")?,
        }
    }

    writeln!(
        out,
        "Completed {} of {} cards this round.",
        deck.completed_count(),
        deck.len()
    )?;
    Ok(())
}
