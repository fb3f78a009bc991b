//! Sample posts and an in-memory image gallery used by the front end.

use crate::app::auth::CurrentUser;
use crate::app::error::ApiError;
use crate::ports::PushSender;
use crate::state::AppState;

use axum::Extension;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use std::sync::RwLock;

const SAMPLE_IMAGE_COUNT: u64 = 6;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Post {
    id: u64,
    title: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    likes: u32,
}

fn sample_post(id: u64, now: OffsetDateTime) -> Post {
    Post {
        id,
        title: "Welcome".to_string(),
        content: "Sample post served while posts are not stored yet.".to_string(),
        image: None,
        author: "System".to_string(),
        author_id: None,
        timestamp: now,
        status: None,
        likes: 5,
    }
}

#[derive(Serialize)]
pub(crate) struct PostsResponse {
    success: bool,
    posts: Vec<Post>,
    total: usize,
}

pub(crate) async fn list_posts() -> Json<PostsResponse> {
    let posts = vec![sample_post(1, OffsetDateTime::now_utc())];
    Json(PostsResponse {
        success: true,
        total: posts.len(),
        posts,
    })
}

#[derive(Serialize)]
pub(crate) struct PostResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    post: Post,
}

pub(crate) async fn get_post(Path(id): Path<u64>) -> Json<PostResponse> {
    Json(PostResponse {
        success: true,
        message: None,
        post: sample_post(id, OffsetDateTime::now_utc()),
    })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NewPostRequest {
    title: Option<String>,
    content: Option<String>,
    image: Option<String>,
}

/// Echoes the post back; nothing is persisted.
pub(crate) async fn create_post(
    Extension(CurrentUser(author)): Extension<CurrentUser>,
    payload: Result<Json<NewPostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let Json(request) = payload?;
    let (Some(title), Some(content)) = (
        request.title.filter(|title| !title.trim().is_empty()),
        request.content.filter(|content| !content.trim().is_empty()),
    ) else {
        return Err(ApiError::validation("title and content are required"));
    };

    let now = OffsetDateTime::now_utc();
    let post = Post {
        id: (now.unix_timestamp_nanos() / 1_000_000) as u64,
        title,
        content,
        image: request.image,
        author: author.username,
        author_id: Some(author.id),
        timestamp: now,
        status: Some("published"),
        likes: 0,
    };
    tracing::info!(post_id = post.id, author = %post.author, "post created");

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            success: true,
            message: Some("Post created"),
            post,
        }),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub description: String,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct ImageGallery {
    images: RwLock<Vec<Image>>,
}

impl ImageGallery {
    pub fn seeded() -> Self {
        let images = (1..=SAMPLE_IMAGE_COUNT)
            .map(|id| Image {
                id,
                url: format!("https://picsum.photos/300/200?random={id}"),
                title: format!("Image {id}"),
                description: format!("Description of image {id}"),
                created_at: None,
            })
            .collect();
        Self {
            images: RwLock::new(images),
        }
    }

    pub fn list(&self) -> Result<Vec<Image>, ApiError> {
        let images = self.images.read().map_err(ApiError::internal)?;
        Ok(images.clone())
    }

    pub fn get(&self, id: u64) -> Result<Option<Image>, ApiError> {
        let images = self.images.read().map_err(ApiError::internal)?;
        Ok(images.iter().find(|image| image.id == id).cloned())
    }

    pub fn add(
        &self,
        title: String,
        url: String,
        description: String,
        now: OffsetDateTime,
    ) -> Result<Image, ApiError> {
        let mut images = self.images.write().map_err(ApiError::internal)?;
        let image = Image {
            id: images.iter().map(|image| image.id).max().unwrap_or(0) + 1,
            url,
            title,
            description,
            created_at: Some(now),
        };
        images.push(image.clone());
        Ok(image)
    }
}

pub(crate) async fn list_images<S: PushSender>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Image>>, ApiError> {
    Ok(Json(state.images.list()?))
}

pub(crate) async fn get_image<S: PushSender>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> Result<Json<Image>, ApiError> {
    state
        .images
        .get(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NewImageRequest {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ImageCreatedResponse {
    success: bool,
    message: &'static str,
    image: Image,
}

pub(crate) async fn create_image<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<NewImageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ImageCreatedResponse>), ApiError> {
    let Json(request) = payload?;
    let (Some(title), Some(url)) = (
        request.title.filter(|title| !title.trim().is_empty()),
        request.url.filter(|url| !url.trim().is_empty()),
    ) else {
        return Err(ApiError::validation("title and url are required"));
    };
    let image = state.images.add(
        title,
        url,
        request.description.unwrap_or_default(),
        OffsetDateTime::now_utc(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(ImageCreatedResponse {
            success: true,
            message: "Image added",
            image,
        }),
    ))
}
