use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::seo::slugify;
use crate::{non_blank, normalize_tags, validate_name};

/// Lifecycle label of a content record.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Review,
    Approved,
    Published,
    Scheduled,
    Archived,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Review => "review",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Published => "published",
            WorkflowStatus::Scheduled => "scheduled",
            WorkflowStatus::Archived => "archived",
        }
    }

    pub fn allowed_targets(self) -> &'static [WorkflowStatus] {
        use WorkflowStatus::*;
        match self {
            Draft => &[Review, Archived],
            Review => &[Draft, Approved],
            Approved => &[Published, Scheduled, Draft],
            Scheduled => &[Published, Draft],
            Published => &[Archived, Draft],
            Archived => &[Draft],
        }
    }

    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        self.allowed_targets().contains(&next)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub actor: String,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub author: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub status: WorkflowStatus,
    pub focus_keyword: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub author: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

impl PostInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("title", &self.title)?;
        validate_name("author", &self.author)?;
        if let Some(slug) = non_blank(self.slug.clone()) {
            if slugify(&slug) != slug {
                return Err(ModelError::validation("slug may only contain lowercase letters, digits and single dashes"));
            }
        } else if slugify(&self.title).is_empty() {
            return Err(ModelError::validation("cannot derive a slug from the title; provide one"));
        }
        Ok(())
    }

    /// Explicit slug, or one derived from the title.
    pub fn base_slug(&self) -> String {
        non_blank(self.slug.clone()).unwrap_or_else(|| slugify(&self.title))
    }
}

impl Post {
    pub fn new(input: PostInput, slug: String, now: DateTime<Utc>) -> Self {
        let mut post = Self {
            id: Uuid::new_v4(),
            title: String::new(),
            slug,
            body: String::new(),
            excerpt: None,
            author: String::new(),
            category: None,
            tags: Vec::new(),
            status: WorkflowStatus::Draft,
            focus_keyword: None,
            meta_title: None,
            meta_description: None,
            scheduled_at: None,
            published_at: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        post.apply(input, now);
        post
    }

    /// Overwrite the editable fields. Slug and status are managed separately.
    pub fn apply(&mut self, input: PostInput, now: DateTime<Utc>) {
        self.title = input.title.trim().to_string();
        self.body = input.body;
        self.excerpt = non_blank(input.excerpt);
        self.author = input.author.trim().to_string();
        self.category = non_blank(input.category);
        self.tags = normalize_tags(input.tags);
        self.focus_keyword = non_blank(input.focus_keyword);
        self.meta_title = non_blank(input.meta_title);
        self.meta_description = non_blank(input.meta_description);
        self.updated_at = now;
    }

    /// Move to `to`, recording the change. Scheduling needs a future `scheduled_at`.
    pub fn transition(
        &mut self,
        to: WorkflowStatus,
        actor: &str,
        note: Option<String>,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), ModelError> {
        if !self.status.can_transition_to(to) {
            return Err(ModelError::InvalidTransition { from: self.status.as_str().into(), to: to.as_str().into() });
        }
        match to {
            WorkflowStatus::Scheduled => {
                let at = scheduled_at.ok_or_else(|| ModelError::validation("scheduled_at required"))?;
                if at <= now {
                    return Err(ModelError::validation("scheduled_at must be in the future"));
                }
                self.scheduled_at = Some(at);
            }
            WorkflowStatus::Published => {
                self.published_at = Some(now);
                self.scheduled_at = None;
            }
            _ => self.scheduled_at = None,
        }
        self.history.push(StatusChange { from: self.status, to, actor: actor.to_string(), note: non_blank(note), at: now });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == WorkflowStatus::Scheduled && self.scheduled_at.map_or(false, |at| at <= now)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowTask {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub assignee: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl WorkflowTask {
    pub fn new(post_id: Uuid, input: TaskInput, now: DateTime<Utc>) -> Result<Self, ModelError> {
        validate_name("title", &input.title)?;
        Ok(Self {
            id: Uuid::new_v4(),
            post_id,
            title: input.title.trim().to_string(),
            assignee: non_blank(input.assignee),
            due_at: input.due_at,
            completed: false,
            completed_at: None,
            created_at: now,
        })
    }
}
