//! Console output and prompts for the interactive CLI

use crossterm::style::Stylize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};

use crate::inspector::ValidationResult;
use crate::session::SessionToken;
use crate::Result;

const WIDTH: usize = 60;

pub fn rule() {
    println!("{}", "=".repeat(WIDTH));
}

/// Print a centered, highlighted title between two rules
pub fn banner(title: &str) {
    println!();
    rule();
    println!("{}", format!("{:^width$}", title, width = WIDTH).cyan().bold());
    rule();
}

pub fn success(message: &str) {
    println!("{}", format!("✅ {}", message).green());
}

pub fn error(message: &str) {
    println!("{}", format!("❌ {}", message).red());
}

pub fn warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).yellow());
}

pub fn info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).blue());
}

pub fn highlight(message: &str) {
    println!("{}", format!("✨ {}", message).magenta().bold());
}

/// Print a session string framed by rules
pub fn show_session(title: &str, token: &SessionToken) {
    println!();
    rule();
    println!("{}", title);
    rule();
    println!("{}", token.expose());
    rule();
}

/// Print a left-aligned table
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        info("No data to display");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header = format_row(headers.iter().copied(), &widths);
    println!("{}", header.as_str().cyan());
    println!("{}", "-".repeat(header.chars().count()));
    for row in rows {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Describe a validation result on the console
pub fn report(result: &ValidationResult) {
    match (&result.identity, &result.error) {
        (Some(identity), _) => {
            success("Session string is valid!");
            let icon = if identity.is_bot { "🤖 Bot" } else { "👤 User" };
            info(&format!("{}: {}", icon, identity.display_name()));
            info(&format!("🆔 ID: {}", identity.id));
            if let Some(phone) = &identity.phone {
                info(&format!("📱 Phone: {}", phone));
            }
            if identity.is_verified {
                info("✅ Verified Account");
            }
            if identity.is_premium {
                info("⭐ Premium Account");
            }
        }
        (None, Some(err)) => {
            error(&err.to_string());
            if let Some(wait) = err.retry_after() {
                warning(&format!("Please wait {} seconds before trying again.", wait));
            }
        }
        (None, None) => error("Session string is invalid or expired!"),
    }
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Ask for a line of text; empty input is allowed when `required` is false
pub fn input(prompt: &str, required: bool) -> Result<String> {
    let value: String = Input::with_theme(&theme())
        .with_prompt(prompt)
        .allow_empty(!required)
        .interact_text()?;
    Ok(value.trim().to_string())
}

/// Ask for input without echoing it
pub fn secret(prompt: &str) -> Result<String> {
    let value = Password::with_theme(&theme())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    Ok(value.trim().to_string())
}

pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    let answer = Confirm::with_theme(&theme())
        .with_prompt(prompt)
        .default(default)
        .interact()?;
    Ok(answer)
}

/// Let the user pick one of `items`, returning its index
pub fn select<T: ToString>(prompt: &str, items: &[T]) -> Result<usize> {
    let choice = Select::with_theme(&theme())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?;
    Ok(choice)
}
