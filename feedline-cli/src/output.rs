use chrono::{DateTime, Utc};
#[cfg(feature = "colored-output")]
use colored::*;
use feedline_client::{Comment, FieldErrors, Post, SessionSnapshot, User};
use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

pub struct OutputManager {
    colored: bool,
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(colored: bool, format: OutputFormat) -> Self {
        Self { colored, format }
    }

    /// Acknowledgement of a command without a payload.
    pub fn format_message(&self, message: &str) -> Result<String> {
        match self.format {
            OutputFormat::Pretty => Ok(format!("{} {}", self.colorize("✓", &Color::Green, true), message)),
            OutputFormat::Json => self.format_json(&serde_json::json!({
                "status": "ok",
                "message": message,
            })),
        }
    }

    pub fn format_posts(&self, posts: &[&Post]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(&posts),
            OutputFormat::Pretty => {
                if posts.is_empty() {
                    return Ok("No posts yet.".to_string());
                }
                let mut output = String::new();
                for post in posts {
                    output.push_str(&self.format_post_pretty(post));
                    output.push('\n');
                }
                Ok(output.trim_end().to_string())
            }
        }
    }

    fn format_post_pretty(&self, post: &Post) -> String {
        let mut output = format!(
            "{} {} {}\n",
            self.colorize(&format!("#{}", post.id), &Color::Yellow, false),
            self.colorize(&post.title, &Color::Green, true),
            self.colorize(&format!("@{}", post.author_username), &Color::Cyan, false),
        );
        output.push_str(&format!("  {}\n", post.content));
        let liked = if post.is_liked { " (liked)" } else { "" };
        output.push_str(&format!(
            "  {} {}{}",
            self.colorize("Likes:", &Color::Yellow, false),
            post.like_count,
            liked
        ));
        if let Some(published_at) = post.published_at {
            output.push_str(&format!(
                "  {} {}",
                self.colorize("Published:", &Color::Yellow, false),
                format_timestamp(published_at)
            ));
        }
        output.push('\n');
        output
    }

    pub fn format_comments(&self, comments: &[Comment]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(&comments),
            OutputFormat::Pretty => {
                if comments.is_empty() {
                    return Ok("No comments yet.".to_string());
                }
                let lines: Vec<String> = comments
                    .iter()
                    .map(|c| {
                        format!(
                            "{}: {}",
                            self.colorize(&format!("@{}", c.author_username), &Color::Cyan, false),
                            c.content
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
        }
    }

    pub fn format_user(&self, user: &User, profile_picture: &str) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(user),
            OutputFormat::Pretty => {
                let mut output = String::new();
                output.push_str(&self.colorize(&format!("@{}", user.username), &Color::Green, true));
                output.push('\n');
                if let Some(email) = &user.email {
                    self.push_field(&mut output, "Email", email);
                }
                if let Some(count) = user.followers_count {
                    self.push_field(&mut output, "Followers", &count.to_string());
                }
                if let Some(count) = user.following_count {
                    self.push_field(&mut output, "Following", &count.to_string());
                }
                if let Some(is_following) = user.is_following {
                    let value = if is_following { "yes" } else { "no" };
                    self.push_field(&mut output, "You follow", value);
                }
                if let Some(created_at) = user.profile.as_ref().and_then(|p| p.created_at) {
                    self.push_field(&mut output, "Member since", &format_timestamp(created_at));
                }
                self.push_field(&mut output, "Avatar", &display_avatar(profile_picture));
                Ok(output.trim_end().to_string())
            }
        }
    }

    pub fn format_session(&self, snapshot: &SessionSnapshot) -> Result<String> {
        match (&self.format, &snapshot.user) {
            (OutputFormat::Json, _) => self.format_json(snapshot),
            (OutputFormat::Pretty, Some(user)) => self.format_user(user, &snapshot.profile_picture),
            (OutputFormat::Pretty, None) => Ok("Not logged in.".to_string()),
        }
    }

    pub fn format_usernames(&self, title: &str, usernames: &[String]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(&usernames),
            OutputFormat::Pretty => {
                let mut output = self.colorize(
                    &format!("{} ({})", title, usernames.len()),
                    &Color::Green,
                    true,
                );
                for username in usernames {
                    output.push_str(&format!("\n  @{}", username));
                }
                Ok(output)
            }
        }
    }

    /// Human readable registration errors, one per line.
    pub fn format_field_errors(&self, errors: &FieldErrors) -> String {
        errors
            .iter()
            .map(|(field, message)| {
                format!("  {}: {}", self.colorize(field, &Color::Yellow, false), message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push_field(&self, output: &mut String, label: &str, value: &str) {
        output.push_str(&format!(
            "  {}: {}\n",
            self.colorize(label, &Color::Yellow, false),
            self.colorize(value, &Color::Cyan, false)
        ));
    }

    fn format_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string_pretty(value).map_err(Into::into)
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Cyan,
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Inline placeholder images are not worth printing.
fn display_avatar(reference: &str) -> String {
    if reference.starts_with("data:") {
        "(default)".to_string()
    } else {
        reference.to_string()
    }
}
