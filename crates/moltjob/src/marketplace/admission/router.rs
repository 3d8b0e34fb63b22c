use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::gates::AdmissionRequest;
use super::rejection::{Outcome, Rejection};
use super::service::{
    AdmissionService, AdmissionServiceError, ApplicationFilter, ApplicationOrder,
};
use crate::marketplace::credentials::Authenticated;
use crate::marketplace::domain::{
    ApplicationId, ApplicationStatus, CandidateId, ConversationId, EmployerId, JobId,
    Participant,
};
use crate::marketplace::notifications::NotificationPublisher;
use crate::marketplace::pagination::PageRequest;

/// Routes for admission, listings, status changes, conversations, matches,
/// agent auto-apply, and the activity log. Expects an [`Authenticated`] extension on every request.
pub fn admission_router<N>(service: Arc<AdmissionService<N>>) -> Router
where
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            get(list_handler::<N>).post(submit_handler::<N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<N>),
        )
        .route(
            "/api/v1/employer/applications",
            get(employer_list_handler::<N>),
        )
        .route(
            "/api/v1/employer/applications/:application_id/status",
            put(status_handler::<N>),
        )
        .route(
            "/api/v1/messages/:conversation_id",
            get(messages_handler::<N>).post(post_message_handler::<N>),
        )
        .route("/api/v1/jobs/matches", get(matches_handler::<N>))
        .route("/api/v1/agent/apply", post(auto_apply_handler::<N>))
        .route("/api/v1/activity", get(activity_handler::<N>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct SubmitApplicationBody {
    pub job_posting_id: Option<String>,
    pub cover_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub content: Option<String>,
}

/// Query string shared by the paginated listings. Values stay raw so that
/// malformed numbers fall back to defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub status: Option<String>,
    pub job_id: Option<String>,
    pub sort_by: Option<String>,
}

impl ListQuery {
    fn page(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), self.per_page.as_deref())
    }

    fn filter(&self) -> Result<ApplicationFilter, Rejection> {
        let status = match self.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(ApplicationStatus::parse(raw).ok_or_else(|| {
                Rejection::validation(format!("Unknown application status: {raw}"))
            })?),
            None => None,
        };
        let order = match self.sort_by.as_deref() {
            Some("match_score") => ApplicationOrder::BestMatch,
            _ => ApplicationOrder::Newest,
        };
        Ok(ApplicationFilter {
            status,
            job_id: self
                .job_id
                .as_deref()
                .filter(|raw| !raw.trim().is_empty())
                .map(JobId::from),
            order,
        })
    }
}

fn respond<T: Serialize>(
    success: StatusCode,
    result: Result<Outcome<T>, AdmissionServiceError>,
) -> Response {
    match result {
        Ok(Outcome::Accepted(value)) => (success, axum::Json(value)).into_response(),
        Ok(Outcome::Rejected(rejection)) => rejection_response(rejection),
        Err(other) => {
            error!(error = %other, "admission request failed");
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) fn rejection_response(rejection: Rejection) -> Response {
    (rejection.code.http_status(), axum::Json(rejection)).into_response()
}

fn forbidden(message: &str) -> Response {
    let payload = json!({
        "error": message,
        "code": "FORBIDDEN",
    });
    (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
}

fn candidate_of(auth: &Authenticated) -> Option<CandidateId> {
    match auth.principal.participant() {
        Participant::Candidate(id) => Some(id),
        Participant::Employer(_) => None,
    }
}

fn employer_of(auth: &Authenticated) -> Option<EmployerId> {
    match auth.principal.participant() {
        Participant::Employer(id) => Some(id),
        Participant::Candidate(_) => None,
    }
}

pub(crate) async fn submit_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    axum::Json(body): axum::Json<SubmitApplicationBody>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(candidate_id) = candidate_of(&auth) else {
        return forbidden("Only job seekers can submit applications");
    };
    let Some(job_id) = body.job_posting_id.filter(|id| !id.trim().is_empty()) else {
        return rejection_response(Rejection::validation(
            "job_posting_id and cover_message are required",
        ));
    };

    let request = AdmissionRequest {
        candidate_id,
        job_id: JobId(job_id),
        cover_message: body.cover_message.unwrap_or_default(),
        credential_id: Some(auth.credential_id.clone()),
    };
    respond(StatusCode::CREATED, service.admit(request))
}

pub(crate) async fn list_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Query(query): Query<ListQuery>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(candidate_id) = candidate_of(&auth) else {
        return forbidden("Only job seekers can access this endpoint");
    };
    let filter = match query.filter() {
        Ok(filter) => ApplicationFilter {
            job_id: None,
            order: ApplicationOrder::Newest,
            ..filter
        },
        Err(rejection) => return rejection_response(rejection),
    };
    respond(
        StatusCode::OK,
        service.list_applications(&candidate_id, &filter, query.page()),
    )
}

pub(crate) async fn employer_list_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Query(query): Query<ListQuery>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(employer_id) = employer_of(&auth) else {
        return forbidden("Only employers can access this endpoint");
    };
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(rejection) => return rejection_response(rejection),
    };
    respond(
        StatusCode::OK,
        service.employer_applications(&employer_id, &filter, query.page()),
    )
}

pub(crate) async fn activity_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Query(query): Query<ListQuery>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let actor = auth.principal.participant();
    respond(StatusCode::OK, service.activity(&actor, query.page()))
}

pub(crate) async fn application_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Path(application_id): Path<String>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let viewer = auth.principal.participant();
    respond(
        StatusCode::OK,
        service.get_application(&viewer, &ApplicationId(application_id)),
    )
}

pub(crate) async fn status_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<StatusBody>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(employer_id) = employer_of(&auth) else {
        return forbidden("Only employers can update application status");
    };
    let requested = body.status.unwrap_or_default();
    respond(
        StatusCode::OK,
        service.update_status(
            &employer_id,
            &ApplicationId(application_id),
            &requested,
            Some(&auth.credential_id),
        ),
    )
}

pub(crate) async fn messages_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Path(conversation_id): Path<String>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let reader = auth.principal.participant();
    respond(
        StatusCode::OK,
        service.messages(&reader, &ConversationId(conversation_id)),
    )
}

pub(crate) async fn post_message_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
    Path(conversation_id): Path<String>,
    axum::Json(body): axum::Json<MessageBody>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let author = auth.principal.participant();
    let content = body.content.unwrap_or_default();
    respond(
        StatusCode::CREATED,
        service.post_message(
            &author,
            &ConversationId(conversation_id),
            &content,
            Some(&auth.credential_id),
        ),
    )
}

pub(crate) async fn matches_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(candidate_id) = candidate_of(&auth) else {
        return forbidden("Only job seekers can view matches");
    };
    respond(StatusCode::OK, service.matches(&candidate_id))
}

pub(crate) async fn auto_apply_handler<N>(
    State(service): State<Arc<AdmissionService<N>>>,
    Extension(auth): Extension<Authenticated>,
) -> Response
where
    N: NotificationPublisher + 'static,
{
    let Some(candidate_id) = candidate_of(&auth) else {
        return forbidden("Only job seekers can use agent apply");
    };
    respond(
        StatusCode::OK,
        service
            .auto_apply(&candidate_id, Some(&auth.credential_id))
            .await,
    )
}
