//! Typed operations over the movie backend's routes.
//!
//! Each operation builds a [`RequestDescriptor`] and routes it through the
//! client's read or mutate path, so caching and invalidation follow from the
//! route. Payloads stay untyped JSON.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::client::CineClient;
use crate::error::{CineError, Result};
use crate::invalidation::MutationKind;
use crate::request::RequestDescriptor;

/// Sort orders accepted by `GET /movies/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovieSort {
    #[default]
    ImdbRatingDesc,
    ImdbRatingAsc,
    ReleaseDateDesc,
    ReleaseDateAsc,
    TitleAsc,
    TitleDesc,
    /// Randomized order; never cached.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchType {
    Title,
    CastCrew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrendingWindow {
    Day,
    Week,
    #[default]
    Month,
}

/// Recommendation strategies of `/api/recommender/recommendations/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationStrategy {
    #[default]
    Hybrid,
    ContentBased,
    Collaborative,
}

/// Optional parameters for personalized recommendations. Unset fields use
/// the backend's defaults (hybrid, excluding watched movies).
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct RecommendationOptions {
    pub strategy: Option<RecommendationStrategy>,
    pub exclude_watched: Option<bool>,
}

/// Account details for `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
}

/// Filters for the movie listing.
#[derive(Debug, Clone, Default, Builder, Serialize)]
pub struct MovieQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<MovieSort>,
    pub genres: Option<Vec<String>>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    #[builder(into)]
    pub cast_crew: Option<String>,
    #[builder(into)]
    pub search: Option<String>,
    pub search_type: Option<SearchType>,
    pub content_rating: Option<Vec<String>>,
    pub mood_tags: Option<Vec<String>>,
    pub streaming_platforms: Option<Vec<String>>,
    /// `YYYY-MM-DD`.
    #[builder(into)]
    pub release_date_lte: Option<String>,
    /// Makes a `random` sort repeatable across pages.
    pub random_seed: Option<u64>,
}

impl MovieQuery {
    pub fn to_request(&self) -> RequestDescriptor {
        RequestDescriptor::get("/movies/")
            .query_opt("page", self.page)
            .query_opt("per_page", self.per_page)
            .query_opt("sort", self.sort.map(|s| s.to_string()))
            .query_opt("genres", self.genres.clone())
            .query_opt("min_year", self.min_year)
            .query_opt("max_year", self.max_year)
            .query_opt("min_rating", self.min_rating)
            .query_opt("max_rating", self.max_rating)
            .query_opt("cast_crew", self.cast_crew.clone())
            .query_opt("search", self.search.clone())
            .query_opt("search_type", self.search_type.map(|s| s.to_string()))
            .query_opt("content_rating", self.content_rating.clone())
            .query_opt("mood_tags", self.mood_tags.clone())
            .query_opt("streaming_platforms", self.streaming_platforms.clone())
            .query_opt("release_date_lte", self.release_date_lte.clone())
            .query_opt("random_seed", self.random_seed)
    }
}

impl CineClient {
    pub async fn list_movies(&self, query: &MovieQuery) -> Result<Value> {
        self.read(query.to_request()).await
    }

    pub async fn search_movies(
        &self,
        query: &str,
        search_type: SearchType,
        page: u32,
        per_page: u32,
    ) -> Result<Value> {
        self.read(
            RequestDescriptor::get("/movies/search/")
                .query("query", query)
                .query("search_type", search_type.to_string())
                .query("page", page)
                .query("per_page", per_page),
        )
        .await
    }

    pub async fn trending_movies(
        &self,
        window: TrendingWindow,
        page: u32,
        per_page: u32,
    ) -> Result<Value> {
        self.read(
            RequestDescriptor::get("/movies/trending/")
                .query("time_window", window.to_string())
                .query("page", page)
                .query("per_page", per_page),
        )
        .await
    }

    pub async fn recommended_movies(&self, page: u32, per_page: u32) -> Result<Value> {
        self.read(
            RequestDescriptor::get("/movies/recommended/")
                .query("page", page)
                .query("per_page", per_page),
        )
        .await
    }

    pub async fn recommendations(
        &self,
        user_id: u64,
        options: RecommendationOptions,
    ) -> Result<Value> {
        self.read(
            RequestDescriptor::get(format!("/api/recommender/recommendations/{user_id}"))
                .query_opt("strategy", options.strategy.map(|s| s.to_string()))
                .query_opt("exclude_watched", options.exclude_watched),
        )
        .await
    }

    pub async fn library(&self) -> Result<Value> {
        self.read(RequestDescriptor::get("/users/me/library")).await
    }

    pub async fn current_user(&self) -> Result<Value> {
        self.read(RequestDescriptor::get("/auth/me")).await
    }

    /// Rate a movie from 1 to 5 stars.
    pub async fn rate_movie(&self, movie_id: u64, rating: f64) -> Result<Value> {
        if !(1.0..=5.0).contains(&rating) {
            return Err(CineError::InvalidArgument(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
        self.mutate(
            RequestDescriptor::post(format!("/movies/{movie_id}/rate")).query("rating", rating),
            MutationKind::RateMovie { movie_id },
        )
        .await
    }

    /// Record a view, which adds the movie to the user's library.
    /// `watch_duration` is in seconds.
    pub async fn record_view(
        &self,
        movie_id: u64,
        completed: bool,
        watch_duration: Option<u32>,
    ) -> Result<Value> {
        self.mutate(
            RequestDescriptor::post(format!("/movies/{movie_id}/view"))
                .query("completed", completed)
                .query_opt("watch_duration", watch_duration),
            MutationKind::RecordView { movie_id },
        )
        .await
    }

    pub async fn remove_from_library(&self, movie_id: u64) -> Result<Value> {
        self.mutate(
            RequestDescriptor::delete(format!("/movies/{movie_id}/view")),
            MutationKind::RemoveFromLibrary { movie_id },
        )
        .await
    }

    pub async fn update_profile(&self, profile: Value) -> Result<Value> {
        self.mutate(
            RequestDescriptor::put("/auth/me").json_body(profile),
            MutationKind::UpdateProfile,
        )
        .await
    }

    pub async fn create_movie(&self, movie: Value) -> Result<Value> {
        self.mutate(
            RequestDescriptor::post("/movies/").json_body(movie),
            MutationKind::CreateMovie,
        )
        .await
    }

    /// Create an account. Returns the new user; does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<Value> {
        let request =
            RequestDescriptor::post("/auth/register").json_body(serde_json::to_value(registration)?);
        self.executor().execute_default(&request).await
    }

    /// Exchange credentials for a bearer token and install it, which also
    /// clears the cache. Returns the token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = RequestDescriptor::post("/auth/login")
            .json_body(serde_json::to_value(LoginBody { username, password })?);
        let payload = self.executor().execute_default(&request).await?;
        let token: TokenBody = serde_json::from_value(payload)?;
        self.set_token(Some(token.access_token.clone()));
        tracing::info!(username, "Logged in");
        Ok(token.access_token)
    }

    /// Drop the bearer token, and with it every cached response.
    pub fn logout(&self) {
        self.set_token(None);
    }

    pub async fn train_recommender(&self) -> Result<Value> {
        self.mutate(
            RequestDescriptor::post("/api/recommender/train"),
            MutationKind::TrainRecommender,
        )
        .await
    }
}
