// surfbind/src/info.rs
//
//! OpenGL information.

/// Describes the OpenGL version that is requested when a context is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GLVersion {
    /// The major OpenGL version (e.g. 4 in 4.2).
    pub major: u8,
    /// The minor OpenGL version (e.g. 2 in 4.2).
    pub minor: u8,
}

impl GLVersion {
    /// Creates a GL version structure with the given major and minor version numbers.
    #[inline]
    pub fn new(major: u8, minor: u8) -> GLVersion {
        GLVersion { major, minor }
    }

    /// Whether this names a released desktop OpenGL version.
    pub fn exists(self) -> bool {
        match self.major {
            1 => self.minor <= 5,
            2 => self.minor <= 1,
            3 => self.minor <= 3,
            4 => self.minor <= 6,
            _ => false,
        }
    }
}

impl Default for GLVersion {
    // What a legacy context reports.
    #[inline]
    fn default() -> GLVersion {
        GLVersion::new(1, 0)
    }
}

#[cfg(test)]
mod test {
    use super::GLVersion;

    #[test]
    fn test_version_table() {
        assert!(GLVersion::new(1, 5).exists());
        assert!(!GLVersion::new(1, 6).exists());
        assert!(GLVersion::new(2, 1).exists());
        assert!(!GLVersion::new(2, 2).exists());
        assert!(GLVersion::new(3, 3).exists());
        assert!(!GLVersion::new(3, 4).exists());
        assert!(GLVersion::new(4, 6).exists());
        assert!(!GLVersion::new(0, 0).exists());
        assert!(!GLVersion::new(5, 0).exists());
        assert!(GLVersion::new(3, 2) < GLVersion::new(4, 0));
    }
}
