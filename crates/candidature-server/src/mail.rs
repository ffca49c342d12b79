use candidature_core::{CandidatureDraft, CandidatureUuid, Submission};
use chrono::{Datelike, SecondsFormat};

const PRIMARY: &str = "#15199E";
const ACCENT: &str = "#3AC569";
const TEXT: &str = "#222222";
const MUTED: &str = "#555555";
const BACKGROUND: &str = "#F5F7FB";
const BORDER: &str = "#E5E7EB";
const FONT: &str = "Arial,Helvetica,sans-serif";

const ORGANISATION: &str = "GPE Cameroun";

pub fn subject(uuid: &CandidatureUuid) -> String {
    format!("Confirmation de candidature – #{uuid}")
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn submitted_at(submission: &Submission) -> String {
    submission
        .submitted_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn financing_rows(candidature: &CandidatureDraft) -> Vec<(&'static str, String)> {
    let financing = &candidature.financing;
    if !financing.mode.requires_details() {
        return Vec::new();
    }
    vec![
        (
            "Institution de financement",
            financing.institution.clone().unwrap_or_default(),
        ),
        (
            "Contact financement",
            financing.contact.clone().unwrap_or_default(),
        ),
        (
            "Email contact financement",
            financing.contact_email.clone().unwrap_or_default(),
        ),
    ]
}

fn summary_rows(candidature: &CandidatureDraft) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Nom complet", candidature.full_name()),
        ("Email", candidature.email.clone()),
        ("Téléphone", candidature.phone.clone()),
        ("Nationalité", candidature.nationality.clone()),
        ("Poste actuel", candidature.current_role.clone()),
        (
            "Mode de financement",
            candidature.financing.mode.as_str().to_string(),
        ),
    ];
    rows.extend(financing_rows(candidature));
    rows.push(("Langues", candidature.languages.join(", ")));
    rows
}

fn levels_table(candidature: &CandidatureDraft) -> String {
    if candidature.levels.is_empty() {
        return String::new();
    }
    let cell = format!("padding:6px 10px;border:1px solid {BORDER};");
    let header = format!("padding:8px 10px;font-family:{FONT};color:{MUTED};font-size:13px;");
    let rows: String = candidature
        .levels
        .iter()
        .map(|(language, level)| {
            format!(
                "<tr><td style=\"{cell}\">{}</td><td style=\"{cell}\">{}</td></tr>",
                escape_html(language),
                escape_html(level.as_str()),
            )
        })
        .collect();
    format!(
        "<table role=\"presentation\" width=\"100%\" style=\"border-collapse:collapse;margin-top:8px;border:1px solid {BORDER};\">\
<thead><tr style=\"background:{BACKGROUND}\"><th align=\"left\" style=\"{header}\">Langue</th><th align=\"left\" style=\"{header}\">Niveau</th></tr></thead>\
<tbody>{rows}</tbody></table>"
    )
}

pub fn render_html(candidature: &CandidatureDraft, submission: &Submission) -> String {
    let uuid = escape_html(&submission.uuid.to_string());
    let date = escape_html(&submitted_at(submission));
    let label = format!("padding:8px 0;color:{MUTED};font-size:13px;width:36%;");
    let summary: String = summary_rows(candidature)
        .into_iter()
        .map(|(name, value)| {
            format!(
                "<tr><td style=\"{label}\">{name}</td><td style=\"padding:8px 0;\">{}</td></tr>",
                escape_html(&value)
            )
        })
        .collect();
    let levels = levels_table(candidature);
    let year = submission.submitted_at.year();
    let greeting = format!(
        "{} {}",
        escape_html(&candidature.first_name),
        escape_html(&candidature.last_name)
    );

    format!(
        r#"<!doctype html>
<html lang="fr">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Confirmation de candidature – #{uuid}</title>
</head>
<body style="margin:0;padding:0;background:{BACKGROUND};">
<table role="presentation" width="100%" style="background:{BACKGROUND};"><tr><td align="center" style="padding:24px;">
<table role="presentation" width="100%" style="max-width:640px;background:#FFFFFF;border-radius:16px;border:1px solid {BORDER};">
<tr><td style="background:{PRIMARY};height:6px;font-size:0;line-height:0;">&nbsp;</td></tr>
<tr><td style="padding:20px 24px 8px 24px;font-family:{FONT};">
<h1 style="margin:0 0 6px 0;color:{PRIMARY};font-size:22px;">Confirmation de candidature</h1>
<p style="margin:0;color:{MUTED};font-size:14px;">Identifiant : <strong style="color:{TEXT}">#{uuid}</strong> &middot; Soumise le : <strong style="color:{TEXT}">{date}</strong></p>
</td></tr>
<tr><td style="padding:8px 24px 0 24px;font-family:{FONT};color:{TEXT};font-size:14px;">
<p>Bonjour {greeting},<br>Nous vous confirmons la réception de votre candidature. Voici un récapitulatif de votre soumission.</p>
<p><span style="display:inline-block;padding:12px 18px;background:{ACCENT};color:#FFFFFF;border-radius:8px;font-weight:bold;">Candidature enregistrée</span></p>
</td></tr>
<tr><td style="padding:0 24px 20px 24px;font-family:{FONT};">
<table role="presentation" width="100%" style="border-collapse:collapse;">{summary}</table>
{levels}
</td></tr>
<tr><td style="padding:16px 24px 22px 24px;border-top:1px solid {BORDER};font-family:{FONT};color:{MUTED};font-size:12px;">
<p style="margin:0 0 6px 0;">Cet email a été envoyé automatiquement, merci de ne pas y répondre directement.</p>
<p style="margin:0;">&copy; {year} {ORGANISATION}</p>
</td></tr>
</table>
</td></tr></table>
</body>
</html>"#
    )
}

pub fn render_text(candidature: &CandidatureDraft, submission: &Submission) -> String {
    let mut text = format!(
        "Bonjour {} {},\n\nVotre candidature a bien été reçue.\nIdentifiant: #{}\nDate de soumission: {}\n\nRécapitulatif:\n",
        candidature.first_name,
        candidature.last_name,
        submission.uuid,
        submitted_at(submission),
    );
    for (name, value) in summary_rows(candidature) {
        text.push_str(&format!("- {name}: {value}\n"));
    }
    if !candidature.levels.is_empty() {
        text.push_str("\nNiveaux:\n");
        for (language, level) in &candidature.levels {
            text.push_str(&format!("- {language}: {}\n", level.as_str()));
        }
    }
    text.push_str("\nMerci pour votre intérêt.\n");
    text
}
