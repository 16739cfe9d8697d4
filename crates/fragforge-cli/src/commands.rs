pub mod build;
pub mod evolve;
pub mod library;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::{Path, PathBuf};

    pub const LIBRARY: &str = r#"
        [[scaffolds]]
        name = "tri"
        heavy-atoms = 6
        attachment-points = [{ class = "A:0" }, { class = "A:0" }, { class = "A:0" }]
        symmetric-aps = [[0, 1, 2]]

        [[scaffolds]]
        name = "di"
        heavy-atoms = 4
        attachment-points = [{ class = "A:0" }, { class = "A:0" }]

        [[fragments]]
        name = "linker"
        heavy-atoms = 2
        fitness = 1.0
        attachment-points = [{ class = "A:1" }, { class = "A:0" }]

        [[fragments]]
        name = "end"
        fitness = 0.5
        attachment-points = [{ class = "A:1" }]

        [[caps]]
        name = "H"
        heavy-atoms = 0
        attachment-points = [{ class = "H:0" }]

        [compatibility]
        "A:0" = ["A:1"]

        [capping]
        "A:0" = "H:0"
    "#;

    pub fn write_library(dir: &Path) -> PathBuf {
        let path = dir.join("library.toml");
        std::fs::write(&path, LIBRARY).unwrap();
        path
    }
}
