use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use common::metrics::CONTENT_PUBLISHED_TOTAL;
use models::content::{Post, PostInput, TaskInput, WorkflowStatus, WorkflowTask};
use models::non_blank;
use models::seo::{analyze, SeoInput, SeoReport};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

/// History actor recorded for automatic publishing.
pub const SCHEDULER_ACTOR: &str = "scheduler";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PostFilter {
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransitionRequest {
    pub to: WorkflowStatus,
    pub actor: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Blog posts, their editorial workflow and per-post tasks.
#[derive(Clone)]
pub struct ContentService {
    posts: Arc<JsonMapStore<Uuid, Post>>,
    tasks: Arc<JsonMapStore<Uuid, WorkflowTask>>,
}

fn slug_taken(map: &HashMap<Uuid, Post>, slug: &str, except: Option<Uuid>) -> bool {
    map.values().any(|p| Some(p.id) != except && p.slug == slug)
}

/// `base`, then `base-2`, `base-3`, ... until one is free.
fn unique_slug(map: &HashMap<Uuid, Post>, base: &str) -> String {
    if !slug_taken(map, base, None) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !slug_taken(map, candidate, None))
        .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4().simple()))
}

impl ContentService {
    pub async fn open(data_dir: &Path) -> Result<Self, ServiceError> {
        Ok(Self {
            posts: JsonMapStore::new(data_dir.join(keys::POSTS)).await?,
            tasks: JsonMapStore::new(data_dir.join(keys::WORKFLOW_TASKS)).await?,
        })
    }

    /// Newest first.
    pub async fn list(&self, filter: &PostFilter, page: Pagination) -> Page<Post> {
        let mut items: Vec<Post> = self
            .posts
            .values()
            .await
            .into_iter()
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.author.as_deref().map_or(true, |a| p.author.eq_ignore_ascii_case(a.trim())))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.slug.cmp(&b.slug)));
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Post, ServiceError> {
        self.posts.get(&id).await.ok_or_else(|| ServiceError::not_found("post"))
    }

    pub async fn create(&self, input: PostInput) -> Result<Post, ServiceError> {
        input.validate()?;
        let explicit = non_blank(input.slug.clone()).is_some();
        let base = input.base_slug();
        let post = self
            .posts
            .update_map(|map| {
                let slug = if explicit {
                    if slug_taken(map, &base, None) {
                        return Err(ServiceError::Conflict(format!("slug `{base}` already in use")));
                    }
                    base
                } else {
                    unique_slug(map, &base)
                };
                let post = Post::new(input, slug, Utc::now());
                map.insert(post.id, post.clone());
                Ok(post)
            })
            .await?;
        info!(post_id = %post.id, slug = %post.slug, "post created");
        Ok(post)
    }

    /// Edit content. The slug only changes when one is given explicitly.
    pub async fn update(&self, id: Uuid, input: PostInput) -> Result<Post, ServiceError> {
        input.validate()?;
        let new_slug = non_blank(input.slug.clone());
        self.posts
            .update_map(|map| {
                if let Some(slug) = &new_slug {
                    if slug_taken(map, slug, Some(id)) {
                        return Err(ServiceError::Conflict(format!("slug `{slug}` already in use")));
                    }
                }
                let post = map.get_mut(&id).ok_or_else(|| ServiceError::not_found("post"))?;
                post.apply(input, Utc::now());
                if let Some(slug) = new_slug {
                    post.slug = slug;
                }
                Ok(post.clone())
            })
            .await
    }

    /// Removes the post and its tasks.
    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let existed = self.posts.remove(&id).await?;
        if existed {
            let dropped = self.tasks.retain(|t| t.post_id != id).await?;
            info!(post_id = %id, tasks = dropped, "post deleted");
        }
        Ok(existed)
    }

    pub async fn transition(&self, id: Uuid, req: TransitionRequest) -> Result<Post, ServiceError> {
        if req.actor.trim().is_empty() {
            return Err(ServiceError::Validation("actor required".into()));
        }
        let post = self
            .posts
            .update(&id, "post", |post| {
                post.transition(req.to, req.actor.trim(), req.note, req.scheduled_at, Utc::now())?;
                Ok(post.clone())
            })
            .await?;
        if post.status == WorkflowStatus::Published {
            CONTENT_PUBLISHED_TOTAL.inc();
        }
        info!(post_id = %id, status = post.status.as_str(), actor = %req.actor, "post transitioned");
        Ok(post)
    }

    /// Publish every scheduled post whose time has come.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>, ServiceError> {
        let published = self
            .posts
            .update_map(|map| {
                let mut published = Vec::new();
                for post in map.values_mut().filter(|p| p.is_due(now)) {
                    match post.transition(WorkflowStatus::Published, SCHEDULER_ACTOR, None, None, now) {
                        Ok(()) => published.push(post.clone()),
                        Err(e) => warn!(post_id = %post.id, error = %e, "scheduled publish skipped"),
                    }
                }
                Ok(published)
            })
            .await?;
        if !published.is_empty() {
            CONTENT_PUBLISHED_TOTAL.inc_by(published.len() as u64);
            info!(count = published.len(), "scheduled posts published");
        }
        Ok(published)
    }

    /// SEO report for a stored post; the meta title wins over the title.
    pub async fn seo_report(&self, id: Uuid) -> Result<SeoReport, ServiceError> {
        let post = self.get(id).await?;
        Ok(analyze(&SeoInput {
            title: post.meta_title.unwrap_or(post.title),
            meta_description: post.meta_description,
            body: post.body,
            focus_keyword: post.focus_keyword,
            slug: Some(post.slug),
        }))
    }

    pub async fn create_task(&self, post_id: Uuid, input: TaskInput) -> Result<WorkflowTask, ServiceError> {
        if self.posts.get(&post_id).await.is_none() {
            return Err(ServiceError::not_found("post"));
        }
        let task = WorkflowTask::new(post_id, input, Utc::now())?;
        self.tasks.insert(task.id, task.clone()).await?;
        Ok(task)
    }

    /// Open tasks first, then by due date.
    pub async fn list_tasks(&self, post_id: Uuid) -> Vec<WorkflowTask> {
        let mut items: Vec<WorkflowTask> =
            self.tasks.values().await.into_iter().filter(|t| t.post_id == post_id).collect();
        items.sort_by(|a, b| {
            a.completed
                .cmp(&b.completed)
                .then_with(|| match (a.due_at, b.due_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then(a.created_at.cmp(&b.created_at))
        });
        items
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<WorkflowTask, ServiceError> {
        self.tasks
            .update(&task_id, "task", |task| {
                if !task.completed {
                    task.completed = true;
                    task.completed_at = Some(Utc::now());
                }
                Ok(task.clone())
            })
            .await
    }

    pub async fn delete_task(&self, task_id: Uuid) -> Result<bool, ServiceError> {
        self.tasks.remove(&task_id).await
    }
}
