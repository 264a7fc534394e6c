//! Export emails as a Markdown digest.

use std::io::Write;
use std::path::Path;

use crate::error::{MailsenseError, Result};
use crate::model::EmailRecord;

/// Write a digest: one section per email with headers, enrichment (when
/// present) and the body.
pub fn export_markdown(emails: &[EmailRecord], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::io(parent, e))?;
        }
    }
    let mut file =
        std::fs::File::create(output_path).map_err(|e| MailsenseError::io(output_path, e))?;

    writeln!(file, "# Email digest ({} messages)", emails.len())
        .map_err(|e| MailsenseError::io(output_path, e))?;

    for email in emails {
        write_email(&mut file, email).map_err(|e| MailsenseError::io(output_path, e))?;
    }
    Ok(())
}

fn write_email(out: &mut impl Write, email: &EmailRecord) -> std::io::Result<()> {
    let index = email
        .assigned_index
        .map(|i| i.to_string())
        .unwrap_or_else(|| "-".into());
    writeln!(out)?;
    writeln!(out, "## [{index}] {}", email.subject)?;
    writeln!(out)?;
    writeln!(out, "- **From:** {}", email.from)?;
    writeln!(out, "- **Date:** {}", email.date.format("%Y-%m-%d %H:%M"))?;
    writeln!(out, "- **ID:** `{}`", email.unique_id)?;

    if !email.enrichment.is_empty() {
        writeln!(out, "- **Category:** {}", email.classification_or_default())?;
        if let Some(sentiment) = email.enrichment.sentiment.as_deref() {
            writeln!(out, "- **Sentiment:** {sentiment}")?;
        }
        if let Some(summary) = email.enrichment.summary.as_deref() {
            if !summary.is_empty() {
                writeln!(out)?;
                writeln!(out, "> {summary}")?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", email.body.trim())?;
    Ok(())
}
