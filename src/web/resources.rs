use super::*;

#[derive(Debug, Serialize)]
pub(super) struct ResourceView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: &'static str,
    pub url: String,
}

impl From<Resource> for ResourceView {
    fn from(r: Resource) -> Self {
        ResourceView {
            id: r.id,
            title: r.title,
            description: r.description,
            icon: ResourceIcon::from_tag(&r.icon).as_tag(),
            url: r.url,
        }
    }
}

pub(super) async fn api_resources(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<Json<Vec<ResourceView>>, ApiError> {
    require_user(&state, &headers).await?;
    let resources = call_blocking(state.app_state.db.clone(), |db| db.list_resources()).await?;
    Ok(Json(resources.into_iter().map(ResourceView::from).collect()))
}
