use super::record::ListedModel;

/// Parses the tabular stdout of `ollama list`.
///
/// The first line is the header and is skipped. Each remaining line is split
/// on whitespace into name, id, size value, size unit and the relative
/// modification time (the rest of the line). Lines with fewer than four
/// columns are ignored.
pub fn parse_list_output(output: &str) -> Vec<ListedModel> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<ListedModel> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    Some(ListedModel {
        name: parts[0].to_string(),
        id: parts[1].to_string(),
        size: format!("{} {}", parts[2], parts[3]),
        modified: parts[4..].join(" "),
    })
}
