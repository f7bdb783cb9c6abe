use crate::{error::TeamSelectionError, model::Team};

/// Picks the team to work in: the only team, or the one named by `filter`.
pub fn select_team(teams: Vec<Team>, filter: Option<&str>) -> Result<Team, TeamSelectionError> {
    if teams.len() <= 1 {
        return teams.into_iter().next().ok_or(TeamSelectionError::NoTeams);
    }

    let Some(name) = filter.map(str::trim).filter(|name| !name.is_empty()) else {
        return Err(TeamSelectionError::TeamFilterRequired {
            available: team_names(&teams),
        });
    };

    match teams
        .iter()
        .position(|team| team.name.eq_ignore_ascii_case(name))
    {
        Some(index) => Ok(teams[index].clone()),
        None => Err(TeamSelectionError::TeamNotFound {
            name: name.to_string(),
            available: team_names(&teams),
        }),
    }
}

fn team_names(teams: &[Team]) -> Vec<String> {
    teams.iter().map(|team| team.name.clone()).collect()
}
