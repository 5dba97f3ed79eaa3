use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use freeroot_core::clean_workspace;
use std::path::Path;

pub fn run(workspace: &Path, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("removing workspace..."))
    };

    let removed = match clean_workspace(workspace) {
        Ok(removed) => removed,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "clean failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "workspace": workspace,
            "removed": removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else if let Some(ref pb) = pb {
        if removed {
            spin_ok(pb, &format!("removed {}", workspace.display()));
        } else {
            spin_ok(pb, &format!("nothing to remove at {}", workspace.display()));
        }
    }
    Ok(EXIT_SUCCESS)
}
