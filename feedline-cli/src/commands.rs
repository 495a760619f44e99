use std::path::{Path, PathBuf};
use std::sync::Arc;

use feedline_client::{
    ClientConfig, FeedTab, FeedlineClient, FileBackend, NewPost, RegisterPayload, StorageKey,
    resolve_avatar,
};
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::OutputManager;

pub struct CommandExecutor {
    client: FeedlineClient,
    output: OutputManager,
    session_file: PathBuf,
}

impl CommandExecutor {
    pub fn new(config: ClientConfig, session_file: PathBuf, format: OutputFormat) -> Result<Self> {
        debug!(session_file = %session_file.display(), "Using session file");
        let backend = Arc::new(FileBackend::new(&session_file));
        let client = FeedlineClient::new(config, backend)?;
        let colored = cfg!(feature = "colored-output") && !format.is_json();
        Ok(Self {
            client,
            output: OutputManager::new(colored, format),
            session_file,
        })
    }

    fn require_session(&self) -> Result<()> {
        if self.client.store().has_access_token() {
            Ok(())
        } else {
            Err(CliError::NotLoggedIn)
        }
    }

    pub async fn login(&self, username: &str, password: Option<String>) -> Result<()> {
        let password = match password {
            Some(p) => p,
            None => prompt_password("Password:", false)?,
        };
        if !self.client.session().login(username, &password).await {
            return Err(CliError::LoginFailed);
        }
        info!(session_file = %self.session_file.display(), "Session saved");
        println!("{}", self.output.format_message(&format!("Logged in as @{username}"))?);
        Ok(())
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        cpf: String,
        password: Option<String>,
    ) -> Result<()> {
        let password = match password {
            Some(p) => p,
            None => prompt_password("Password:", true)?,
        };
        let payload = RegisterPayload {
            username,
            email,
            national_id: cpf,
            password_confirm: password.clone(),
            password,
        };
        self.client.session().register(&payload).await?;
        println!(
            "{}",
            self.output
                .format_message(&format!("Registered and logged in as @{}", payload.username))?
        );
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.client.session().logout();
        println!("{}", self.output.format_message("Logged out")?);
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        self.client.session().refresh_user().await;
        let snapshot = self.client.session().snapshot();
        println!("{}", self.output.format_session(&snapshot)?);
        Ok(())
    }

    pub async fn feed(&self, following_only: bool) -> Result<()> {
        let posts = self.client.social().feed().await?;
        let (tab, following) = if following_only {
            self.require_session()?;
            (FeedTab::Following, self.client.social().following().await?)
        } else {
            (FeedTab::ForYou, Vec::new())
        };
        let visible = tab.filter(&posts, &following);
        println!("{}", self.output.format_posts(&visible)?);
        Ok(())
    }

    pub async fn create_post(&self, title: String, content: String) -> Result<()> {
        self.require_session()?;
        let post = self
            .client
            .social()
            .create_post(&NewPost { title, content })
            .await?;
        println!("{}", self.output.format_posts(&[&post])?);
        Ok(())
    }

    pub async fn like(&self, post_id: u64, like: bool) -> Result<()> {
        self.require_session()?;
        let social = self.client.social();
        let detail = if like {
            social.like(post_id).await?
        } else {
            social.unlike(post_id).await?
        };
        let fallback = if like { "Liked" } else { "Unliked" };
        println!(
            "{}",
            self.output
                .format_message(detail.as_deref().unwrap_or(fallback))?
        );
        Ok(())
    }

    pub async fn comments(&self, post_id: u64) -> Result<()> {
        let comments = self.client.social().comments(post_id).await?;
        println!("{}", self.output.format_comments(&comments)?);
        Ok(())
    }

    pub async fn comment(&self, post_id: u64, content: &str) -> Result<()> {
        self.require_session()?;
        let comment = self.client.social().add_comment(post_id, content).await?;
        println!(
            "{}",
            self.output.format_comments(std::slice::from_ref(&comment))?
        );
        Ok(())
    }

    pub async fn profile(&self, username: Option<String>, with_posts: bool) -> Result<()> {
        let social = self.client.social();
        let user = match username {
            Some(name) => social.profile(&name).await?,
            None => {
                self.require_session()?;
                let stored = self
                    .client
                    .store()
                    .get(StorageKey::Username)
                    .unwrap_or_default();
                social.own_profile_or_public(&stored).await?
            }
        };
        let picture = resolve_avatar(user.profile_picture());
        println!("{}", self.output.format_user(&user, &picture)?);

        if with_posts {
            let posts = social.posts_by_user(&user.username).await?;
            let posts: Vec<_> = posts.iter().collect();
            println!("{}", self.output.format_posts(&posts)?);
        }
        Ok(())
    }

    pub async fn update_picture(&self, path: &Path) -> Result<()> {
        self.require_session()?;
        let update = self.client.update_profile_picture(path).await?;
        debug!(url = ?update.url, "Profile picture stored");
        println!(
            "{}",
            self.output.format_message(
                update
                    .detail
                    .as_deref()
                    .unwrap_or("Profile picture updated")
            )?
        );
        Ok(())
    }

    pub async fn account(
        &self,
        username: Option<String>,
        email: Option<String>,
        new_password: Option<String>,
        current_password: Option<String>,
    ) -> Result<()> {
        self.require_session()?;
        let social = self.client.social();

        if let Some(name) = username {
            let detail = social.update_username(&name).await?;
            println!(
                "{}",
                self.output
                    .format_message(detail.as_deref().unwrap_or("Username updated"))?
            );
        }

        if email.is_some() || new_password.is_some() {
            let current = match current_password {
                Some(p) => p,
                None => prompt_password("Current password:", false)?,
            };
            let detail = social
                .update_email_password(&current, email.as_deref(), new_password.as_deref())
                .await?;
            println!(
                "{}",
                self.output
                    .format_message(detail.as_deref().unwrap_or("Account updated"))?
            );
        }

        // Keep the stored username in step with the server.
        self.client.session().refresh_user().await;
        Ok(())
    }

    pub async fn follow(&self, username: &str, follow: bool) -> Result<()> {
        self.require_session()?;
        let social = self.client.social();
        let detail = if follow {
            social.follow(username).await?
        } else {
            social.unfollow(username).await?
        };
        let fallback = if follow {
            format!("Following @{username}")
        } else {
            format!("Unfollowed @{username}")
        };
        println!(
            "{}",
            self.output
                .format_message(detail.as_deref().unwrap_or(&fallback))?
        );
        Ok(())
    }

    pub async fn followers(&self, username: &str) -> Result<()> {
        let followers = self.client.social().user_followers(username).await?;
        println!(
            "{}",
            self.output
                .format_usernames(&format!("Followers of @{username}"), &followers)?
        );
        Ok(())
    }

    pub async fn following(&self, username: Option<&str>) -> Result<()> {
        let (title, list) = match username {
            Some(name) => (
                format!("@{name} follows"),
                self.client.social().user_following(name).await?,
            ),
            None => {
                self.require_session()?;
                ("Following".to_string(), self.client.social().following().await?)
            }
        };
        println!("{}", self.output.format_usernames(&title, &list)?);
        Ok(())
    }
}

#[cfg(feature = "interactive")]
fn prompt_password(message: &str, confirm: bool) -> Result<String> {
    let mut prompt = inquire::Password::new(message)
        .with_display_mode(inquire::PasswordDisplayMode::Masked);
    prompt = if confirm {
        prompt.with_custom_confirmation_message("Confirm password:")
    } else {
        prompt.without_confirmation()
    };
    Ok(prompt.prompt()?)
}

#[cfg(not(feature = "interactive"))]
fn prompt_password(_message: &str, _confirm: bool) -> Result<String> {
    Err(CliError::InvalidInput(
        "--password is required when interactive prompts are disabled".into(),
    ))
}
