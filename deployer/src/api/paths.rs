//! Resource name helpers

/// `projects/{project}/locations/{region}`
pub fn location_path(project_id: &str, region: &str) -> String {
    format!("projects/{}/locations/{}", project_id, region)
}

/// `projects/{project}/locations/{region}/services/{service}`
pub fn service_path(project_id: &str, region: &str, service: &str) -> String {
    format!("{}/services/{}", location_path(project_id, region), service)
}

/// `projects/{project}/locations/{region}/builds/{id}`
pub fn build_path(project_id: &str, region: &str, build_id: &str) -> String {
    format!("{}/builds/{}", location_path(project_id, region), build_id)
}

/// `projects/{project}/locations/{region}/repositories/{repository}`
pub fn repository_path(project_id: &str, region: &str, repository: &str) -> String {
    format!("{}/repositories/{}", location_path(project_id, region), repository)
}

/// Docker image reference inside an Artifact Registry repository
pub fn registry_image(project_id: &str, region: &str, repository: &str, image: &str) -> String {
    format!("{}-docker.pkg.dev/{}/{}/{}", region, project_id, repository, image)
}

/// Bucket holding uploaded source archives for a project and region
pub fn source_bucket(project_id: &str, region: &str) -> String {
    format!("run-sources-{}-{}", project_id, region)
}
