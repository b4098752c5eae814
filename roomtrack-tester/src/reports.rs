use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use crate::replay::{CellSummary, ReplayReport};
use roomtrack_core::Frequencies;

pub fn generate_console_report(out: &mut dyn Write, report: &ReplayReport) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Replay Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=================".cyan())?;
    let migrated = if report.was_migrated {
        "yes".yellow()
    } else {
        "no".green()
    };
    writeln!(out, "Stored format: {}", report.format)?;
    writeln!(out, "Migrated: {migrated}")?;
    writeln!(out, "Current day: {}", report.current_day)?;
    writeln!(out, "Cells: {}", report.cells.len())?;
    if let Some(warning) = &report.import_warning {
        writeln!(out, "Import warning: {}", warning.yellow())?;
    }
    let settled = if report.settled {
        "✅ saved".green()
    } else {
        "❌ save pending or failed".red()
    };
    writeln!(out, "Storage: {settled} ({})", report.storage_keys.join(", "))?;

    let m = &report.migration;
    if report.was_migrated {
        writeln!(out)?;
        writeln!(out, "{}", "🛠  Migration".bright_yellow().bold())?;
        writeln!(
            out,
            "   cells kept {} / dropped {}, entries dropped {}, duplicate days {}",
            m.cells_kept, m.cells_dropped, m.entries_dropped, m.duplicate_days
        )?;
        writeln!(
            out,
            "   offers unwrapped {}, letters adopted {} / discarded {}",
            m.offers_unwrapped, m.letters_adopted, m.letters_discarded
        )?;
    }

    for cell in &report.cells {
        writeln!(out)?;
        write_console_cell(out, cell)?;
    }
    Ok(())
}

fn write_console_cell(out: &mut dyn Write, cell: &CellSummary) -> Result<()> {
    let letter = cell.letter.map_or_else(|| "-".to_string(), String::from);
    writeln!(
        out,
        "{} letter {} · {} day(s)",
        cell.cell.bold(),
        letter,
        cell.days
    )?;
    let Some(freq) = &cell.frequencies else {
        writeln!(out, "   {}", "no data".dimmed())?;
        return Ok(());
    };
    writeln!(
        out,
        "   Offers ({} total, top room {:.1}%):",
        freq.total_offers,
        freq.top_share_pct()
    )?;
    for room in &freq.rooms {
        writeln!(
            out,
            "     • {:20} {:>3}  {:>5}%",
            room.name, room.count, room.probability
        )?;
    }
    if let Some(picks) = cell.selections.as_ref().filter(|picks| picks.total_offers > 0) {
        writeln!(out, "   Picks ({} total):", picks.total_offers)?;
        for room in &picks.rooms {
            writeln!(out, "     • {:20} {:>3}", room.name, room.count)?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &ReplayReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &ReplayReport) -> Result<()> {
    writeln!(out, "# Room Tracker Replay\n")?;
    writeln!(out, "| Field | Value |")?;
    writeln!(out, "|-------|-------|")?;
    writeln!(out, "| Stored format | {} |", report.format)?;
    writeln!(out, "| Migrated | {} |", report.was_migrated)?;
    writeln!(out, "| Current day | {} |", report.current_day)?;
    writeln!(out, "| Cells | {} |", report.cells.len())?;
    writeln!(out, "| Saved | {} |", report.settled)?;
    if let Some(warning) = &report.import_warning {
        writeln!(out, "| Import warning | {warning} |")?;
    }

    for cell in &report.cells {
        writeln!(out, "\n## {}\n", cell.cell)?;
        if let Some(letter) = cell.letter {
            writeln!(out, "Letter: **{letter}**\n")?;
        }
        match &cell.frequencies {
            Some(freq) => write_markdown_table(out, freq)?,
            None => writeln!(out, "_No days recorded._")?,
        }
    }
    Ok(())
}

fn write_markdown_table(out: &mut dyn Write, freq: &Frequencies) -> Result<()> {
    writeln!(out, "| Room | Count | Probability |")?;
    writeln!(out, "|------|-------|-------------|")?;
    for room in &freq.rooms {
        writeln!(
            out,
            "| {} | {} | {}% |",
            room.name, room.count, room.probability
        )?;
    }
    writeln!(out, "\n{} offers in total.", freq.total_offers)?;
    Ok(())
}
