/// Expected layout of a raw dataset bucket. Directory names carry their
/// trailing slash, matching how listings report them.
#[derive(Debug, Clone)]
pub struct StructureRules {
    pub required_dirs: Vec<String>,
    pub recommended_dirs: Vec<String>,
    pub optional_dirs: Vec<String>,
    pub core_metadata_files: Vec<String>,
    pub supplementary_metadata_files: Vec<String>,
}

impl Default for StructureRules {
    fn default() -> Self {
        Self {
            required_dirs: to_strings(&["metadata/"]),
            recommended_dirs: to_strings(&["artifacts/"]),
            optional_dirs: to_strings(&[
                "fastqs/",
                "scripts/",
                "raw/",
                "spatial/",
                "workflow_execution/",
            ]),
            core_metadata_files: to_strings(&[
                "ASSAY.csv",
                "CONDITION.csv",
                "DATA.csv",
                "PROTOCOL.csv",
                "SAMPLE.csv",
                "STUDY.csv",
                "SUBJECT.csv",
            ]),
            supplementary_metadata_files: to_strings(&[
                "PMDBS.csv",
                "CLINPATH.csv",
                "MOUSE.csv",
                "CELL.csv",
                "PROTEOMICS.csv",
                "ASSAY_RNAseq.csv",
                "SPATIAL.csv",
                "SDRF.csv",
            ]),
        }
    }
}

impl StructureRules {
    pub fn is_known_dir(&self, name: &str) -> bool {
        self.required_dirs.iter().any(|d| d == name)
            || self.recommended_dirs.iter().any(|d| d == name)
            || self.optional_dirs.iter().any(|d| d == name)
    }

    pub fn is_core_file(&self, name: &str) -> bool {
        self.core_metadata_files.iter().any(|f| f == name)
    }

    pub fn is_supplementary_file(&self, name: &str) -> bool {
        self.supplementary_metadata_files.iter().any(|f| f == name)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
