//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn dev() -> PathBuf {
        "dev".into()
    }

    pub fn dist() -> PathBuf {
        "dist".into()
    }

    pub mod data {
        use std::path::PathBuf;

        pub fn pages() -> PathBuf {
            "data/pages".into()
        }

        pub fn aggregate() -> PathBuf {
            "data/data.json".into()
        }
    }

    pub mod markup {
        use std::path::PathBuf;

        pub fn pages() -> PathBuf {
            "templates/pages".into()
        }
    }

    pub mod style {
        use std::path::PathBuf;

        pub fn entry() -> PathBuf {
            "sass/index.sass".into()
        }

        pub fn output() -> PathBuf {
            "css/style.min.css".into()
        }

        pub fn watch() -> PathBuf {
            "sass".into()
        }

        pub fn browsers() -> Vec<String> {
            vec!["last 10 versions".into()]
        }
    }

    pub mod script {
        use std::path::PathBuf;

        pub fn entry() -> PathBuf {
            "js/main.js".into()
        }

        pub fn output() -> PathBuf {
            "js/main.min.js".into()
        }

        pub fn watch() -> PathBuf {
            "js".into()
        }
    }

    pub mod images {
        use std::path::PathBuf;

        pub fn source() -> PathBuf {
            "img".into()
        }

        pub fn output() -> PathBuf {
            "img".into()
        }

        pub fn jpeg_quality() -> u8 {
            80
        }

        pub fn png_level() -> u8 {
            5
        }
    }

    pub mod fonts {
        use std::path::PathBuf;

        pub fn source() -> PathBuf {
            "fonts".into()
        }

        pub fn output() -> PathBuf {
            "fonts".into()
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn debounce_ms() -> u64 {
        150
    }
}
