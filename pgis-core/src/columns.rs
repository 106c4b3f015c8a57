//! Column-name clean-up applied before data reaches the database.

/// Characters removed from tabular column names.
const STRIPPED: [char; 5] = ['.', '-', '(', ')', '+'];

/// Clean a tabular column name.
///
/// Spaces become underscores, the name is lower-cased, and `.`, `-`, `(`,
/// `)` and `+` are removed.
///
/// # Examples
///
/// ```
/// use pgis_core::columns::sanitize_tabular;
///
/// assert_eq!(sanitize_tabular("Column Name"), "column_name");
/// assert_eq!(sanitize_tabular("geo.display-label"), "geodisplaylabel");
/// ```
#[must_use]
pub fn sanitize_tabular(name: &str) -> String {
    name.replace(' ', "_")
        .to_lowercase()
        .chars()
        .filter(|ch| !STRIPPED.contains(ch))
        .collect()
}

/// What happens to one attribute column during a geo import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoColumnAction {
    /// Keep the column under a (lower-cased) name.
    Keep(String),
    /// Drop the column.
    Drop,
}

/// Decide the fate of an attribute column in a geo import.
///
/// Names are lower-cased. A source `geom` column is dropped because the
/// geometry is rebuilt from the feature geometry, `gid` is dropped because
/// the row index is written under that name, and `uid` becomes `old_uid` so
/// the new primary key can take its place.
#[must_use]
pub fn plan_geo_column(name: &str) -> GeoColumnAction {
    let lower = name.to_lowercase();
    match lower.as_str() {
        "geom" | "geometry" | "gid" => GeoColumnAction::Drop,
        "uid" => GeoColumnAction::Keep(String::from("old_uid")),
        _ => GeoColumnAction::Keep(lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Province_State", "province_state")]
    #[case("Last Update", "last_update")]
    #[case("Case-Fatality_Ratio", "casefatality_ratio")]
    #[case("People (Tested)+", "people_tested")]
    #[case("already_clean", "already_clean")]
    fn sanitizes_tabular_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_tabular(raw), expected);
    }

    #[rstest]
    #[case("GEOM", GeoColumnAction::Drop)]
    #[case("gid", GeoColumnAction::Drop)]
    #[case("UID", GeoColumnAction::Keep("old_uid".into()))]
    #[case("Street_Name", GeoColumnAction::Keep("street_name".into()))]
    fn plans_geo_columns(#[case] raw: &str, #[case] expected: GeoColumnAction) {
        assert_eq!(plan_geo_column(raw), expected);
    }
}
