//! `mergemap projects` handler: project discovery for scoping sync runs.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::config::Settings;
use crate::io::GitLabClient;

pub fn run(settings: &Settings, group: Option<&str>, counts: bool) -> Result<()> {
    let client = GitLabClient::new(settings)?;
    let projects = match group {
        Some(group_ref) => client.list_group_projects(group_ref)?,
        None => client.list_accessible_projects()?,
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    if counts {
        table.set_header(vec!["id", "path", "merge requests"]);
    } else {
        table.set_header(vec!["id", "path"]);
    }

    for project in &projects {
        if counts {
            let total = client.project_mr_count(project.id)?;
            table.add_row(vec![
                project.id.to_string(),
                project.path_with_namespace.clone(),
                total.to_string(),
            ]);
        } else {
            table.add_row(vec![
                project.id.to_string(),
                project.path_with_namespace.clone(),
            ]);
        }
    }
    println!("{table}");
    println!("{} project(s)", projects.len());
    Ok(())
}
