use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use freeroot_store::{Workspace, WorkspaceStatus};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusReport<'a> {
    workspace: &'a Path,
    #[serde(flatten)]
    status: &'a WorkspaceStatus,
}

pub fn run(workspace_path: &Path, json: bool) -> Result<u8, String> {
    let workspace = Workspace::new(workspace_path);
    let status = workspace.status().map_err(|e| e.to_string())?;

    if json {
        let report = StatusReport {
            workspace: workspace_path,
            status: &status,
        };
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("workspace: {}", workspace_path.display());
    match &status {
        WorkspaceStatus::Missing => println!("state:     {}", colorize_state("missing")),
        WorkspaceStatus::Incomplete => {
            println!("state:     {}", colorize_state("incomplete"));
            println!("the next run will purge and rebuild it");
        }
        WorkspaceStatus::Complete { marker } => {
            println!("state:     {}", colorize_state("complete"));
            println!("arch:      {}", marker.arch);
            println!("engine:    {}", marker.engine_url);
            println!("rootfs:    {}", marker.rootfs_url);
            println!("completed: {}", marker.completed_at);
        }
    }
    Ok(EXIT_SUCCESS)
}
