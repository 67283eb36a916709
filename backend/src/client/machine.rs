//! Machine service client
//!
//! Typed HTTP client for the machine service: creating machines from a
//! recipe or a snapshot, listing and destroying them, running command lines
//! inside them and binding projects.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Errors returned by [`MachineServiceClient`]
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or its response read
    #[error("Failed to send request to machine service: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-2xx status
    #[error("Machine service returned error status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response body is not the expected JSON
    #[error("Failed to parse machine service response: {0} - Response body: {1}")]
    Decode(serde_json::Error, String),
}

/// Lifecycle state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineState {
    /// Being created or restored
    Creating,
    /// Up and accepting commands
    Running,
    /// Being destroyed
    Destroying,
}

/// A machine as reported by the machine service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDescriptor {
    /// Machine id
    pub id: String,
    /// Machine type, e.g. `docker`
    #[serde(rename = "type")]
    pub machine_type: String,
    /// Lifecycle state
    pub state: MachineState,
    /// Workspace the machine is bound to
    pub workspace_id: String,
    /// User who created the machine
    #[serde(default)]
    pub owner: Option<String>,
    /// Paths of projects bound to the machine
    #[serde(default)]
    pub projects: Vec<String>,
}

/// A process started in a machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptor {
    /// Process id inside the machine
    pub pid: i32,
    /// Executed command line
    pub command_line: String,
    /// Whether the process is still running
    pub alive: bool,
}

/// Client of the machine service REST API
#[derive(Debug, Clone)]
pub struct MachineServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl MachineServiceClient {
    /// Create a client for the service at `base_url`, e.g. `http://host/api`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/machine{}", self.base_url, path)
    }

    /// Create and start a machine from scratch using a recipe
    ///
    /// # Arguments
    /// * `workspace_id` - Workspace the machine is bound to
    /// * `machine_type` - Type of machine, e.g. `docker`
    /// * `recipe_type` - Type of recipe, e.g. `Dockerfile`
    /// * `recipe_script` - Recipe content
    /// * `output_channel` - Channel machine logs are published to
    pub async fn create_machine_from_recipe(
        &self,
        workspace_id: &str,
        machine_type: &str,
        recipe_type: &str,
        recipe_script: &str,
        output_channel: Option<&str>,
    ) -> Result<MachineDescriptor, ClientError> {
        let body = json!({
            "workspaceId": workspace_id,
            "type": machine_type,
            "recipeDescriptor": { "type": recipe_type, "script": recipe_script },
            "outputChannel": output_channel,
        });
        let response = self.client.post(self.url("/recipe")).json(&body).send().await?;
        decode(response).await
    }

    /// Restore and start a machine from a snapshot
    pub async fn create_machine_from_snapshot(
        &self,
        snapshot_id: &str,
        output_channel: Option<&str>,
    ) -> Result<MachineDescriptor, ClientError> {
        let body = json!({
            "snapshotId": snapshot_id,
            "outputChannel": output_channel,
        });
        let response = self
            .client
            .post(self.url("/snapshot"))
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    /// Machines of a workspace, optionally only those bound to `project_path`
    pub async fn get_machines(
        &self,
        workspace_id: &str,
        project_path: Option<&str>,
    ) -> Result<Vec<MachineDescriptor>, ClientError> {
        let mut query = vec![("workspace", workspace_id)];
        if let Some(project) = project_path {
            query.push(("project", project));
        }
        let response = self.client.get(self.url("")).query(&query).send().await?;
        decode(response).await
    }

    /// Destroy a machine
    pub async fn destroy_machine(&self, machine_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/{}", machine_id)))
            .send()
            .await?;
        check(response).await.map(drop)
    }

    /// Execute a command line in a machine
    pub async fn execute_command(
        &self,
        machine_id: &str,
        command_line: &str,
        output_channel: Option<&str>,
    ) -> Result<ProcessDescriptor, ClientError> {
        let body = json!({
            "commandLine": command_line,
            "outputChannel": output_channel,
        });
        let response = self
            .client
            .post(self.url(&format!("/{}/command", machine_id)))
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    /// Bind a project to a machine
    pub async fn bind_project(&self, machine_id: &str, project_path: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.binding_url(machine_id, project_path))
            .send()
            .await?;
        check(response).await.map(drop)
    }

    /// Unbind a project from a machine
    pub async fn unbind_project(
        &self,
        machine_id: &str,
        project_path: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.binding_url(machine_id, project_path))
            .send()
            .await?;
        check(response).await.map(drop)
    }

    fn binding_url(&self, machine_id: &str, project_path: &str) -> String {
        self.url(&format!(
            "/{}/binding/{}",
            machine_id,
            project_path.trim_start_matches('/')
        ))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    tracing::error!(
        status_code = status.as_u16(),
        error_body = %body,
        "Machine service returned error status"
    );
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let body = check(response).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Decode(e, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serial_test::serial;

    const MACHINE: &str = r#"{
        "id": "machine123",
        "type": "docker",
        "state": "RUNNING",
        "workspaceId": "workspace1",
        "projects": ["/app"]
    }"#;

    fn client(server: &Server) -> MachineServiceClient {
        MachineServiceClient::new(reqwest::Client::new(), format!("{}/", server.url()))
    }

    #[tokio::test]
    #[serial]
    async fn test_create_machine_from_recipe() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/machine/recipe")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "workspaceId": "workspace1",
                "type": "docker",
                "recipeDescriptor": { "type": "Dockerfile", "script": "FROM ubuntu" }
            })))
            .with_status(200)
            .with_body(MACHINE)
            .create_async()
            .await;

        let machine = client(&server)
            .create_machine_from_recipe("workspace1", "docker", "Dockerfile", "FROM ubuntu", None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(machine.id, "machine123");
        assert_eq!(machine.state, MachineState::Running);
        assert_eq!(machine.projects, vec!["/app"]);
    }

    #[tokio::test]
    #[serial]
    async fn test_get_machines_with_project_filter() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/machine")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("workspace".into(), "workspace1".into()),
                Matcher::UrlEncoded("project".into(), "/app".into()),
            ]))
            .with_status(200)
            .with_body(format!("[{}]", MACHINE))
            .create_async()
            .await;

        let machines = client(&server)
            .get_machines("workspace1", Some("/app"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(machines.len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_execute_command() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/machine/machine123/command")
            .match_body(Matcher::PartialJson(json!({ "commandLine": "mvn clean install" })))
            .with_status(200)
            .with_body(r#"{"pid": 7, "commandLine": "mvn clean install", "alive": true}"#)
            .create_async()
            .await;

        let process = client(&server)
            .execute_command("machine123", "mvn clean install", Some("output"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(process.pid, 7);
        assert!(process.alive);
    }

    #[tokio::test]
    #[serial]
    async fn test_bind_unbind_and_destroy() {
        let mut server = Server::new_async().await;
        let bind = server
            .mock("POST", "/machine/machine123/binding/app")
            .with_status(204)
            .create_async()
            .await;
        let unbind = server
            .mock("DELETE", "/machine/machine123/binding/app")
            .with_status(204)
            .create_async()
            .await;
        let destroy = server
            .mock("DELETE", "/machine/machine123")
            .with_status(204)
            .create_async()
            .await;

        let client = client(&server);
        client.bind_project("machine123", "/app").await.unwrap();
        client.unbind_project("machine123", "/app").await.unwrap();
        client.destroy_machine("machine123").await.unwrap();

        bind.assert_async().await;
        unbind.assert_async().await;
        destroy.assert_async().await;
    }

    #[tokio::test]
    #[serial]
    async fn test_error_status_carries_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/machine/snapshot")
            .with_status(404)
            .with_body(r#"{"error":"Snapshot not found"}"#)
            .create_async()
            .await;

        let result = client(&server)
            .create_machine_from_snapshot("snapshot1", None)
            .await;

        mock.assert_async().await;
        match result {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Snapshot not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/machine")
            .match_query(Matcher::UrlEncoded("workspace".into(), "workspace1".into()))
            .with_status(200)
            .with_body("This is not JSON")
            .create_async()
            .await;

        let result = client(&server).get_machines("workspace1", None).await;

        mock.assert_async().await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse machine service response"));
    }
}
