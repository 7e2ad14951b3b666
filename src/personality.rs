use std::cmp::Ordering;

use serde::Serialize;

/// Browser family a personality imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Browser {
    InternetExplorer,
    Chrome,
    Firefox,
    Safari,
}

/// Simulated browser identity.
#[derive(Debug, Clone, Serialize)]
pub struct Personality {
    pub key: &'static str,
    pub description: &'static str,
    pub browser: Browser,
    pub version: &'static str,
    pub user_agent: &'static str,
    pub app_version: &'static str,
    pub platform: &'static str,
    /// Java plugin user agent, `{version}` is replaced by the plugin version.
    pub java_user_agent: Option<&'static str>,
}

impl Personality {
    pub fn lookup(key: &str) -> Option<&'static Personality> {
        PERSONALITIES
            .iter()
            .find(|personality| personality.key.eq_ignore_ascii_case(key))
    }

    pub fn all() -> &'static [Personality] {
        PERSONALITIES
    }

    pub fn is_ie(&self) -> bool {
        self.browser == Browser::InternetExplorer
    }

    /// IE before version 9: inline handlers take no argument and read the
    /// ambient `window.event`.
    pub fn is_legacy_ie(&self) -> bool {
        self.is_ie() && self.version_cmp("9.0") == Ordering::Less
    }

    pub fn app_name(&self) -> &'static str {
        match self.browser {
            Browser::InternetExplorer => "Microsoft Internet Explorer",
            _ => "Netscape",
        }
    }

    /// Compare the personality version with `other`, component by component.
    pub fn version_cmp(&self, other: &str) -> Ordering {
        compare_versions(self.version, other)
    }

    /// Java plugin user agent for a dotted plugin version such as
    /// `1.6.0.32`, rendered as `1.6.0_32`.
    pub fn java_user_agent(&self, plugin_version: &str) -> Option<String> {
        let template = self.java_user_agent?;
        let version = match plugin_version.rsplit_once('.') {
            Some((head, last)) => format!("{head}_{last}"),
            None => plugin_version.to_string(),
        };
        Some(template.replace("{version}", &version))
    }
}

pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| -> Vec<u64> {
        value
            .split('.')
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (left, right) = (parse(left), parse(right));
    let width = left.len().max(right.len());
    for index in 0..width {
        let a = left.get(index).copied().unwrap_or(0);
        let b = right.get(index).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

const XP_JAVA: Option<&str> = Some("Mozilla/4.0 (Windows XP 5.1) Java/{version}");
const WIN7_JAVA: Option<&str> = Some("Mozilla/4.0 (Windows 7 6.1) Java/{version}");

static PERSONALITIES: &[Personality] = &[
    Personality {
        key: "winxpie60",
        description: "Internet Explorer 6.0 (Windows XP)",
        browser: Browser::InternetExplorer,
        version: "6.0",
        user_agent: "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1)",
        app_version: "4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1)",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "winxpie61",
        description: "Internet Explorer 6.1 (Windows XP)",
        browser: Browser::InternetExplorer,
        version: "6.1",
        user_agent: "Mozilla/4.0 (compatible; MSIE 6.1; Windows XP; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        app_version: "4.0 (compatible; MSIE 6.1; Windows XP; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "winxpie70",
        description: "Internet Explorer 7.0 (Windows XP)",
        browser: Browser::InternetExplorer,
        version: "7.0",
        user_agent: "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        app_version: "4.0 (compatible; MSIE 7.0; Windows NT 5.1; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "winxpie80",
        description: "Internet Explorer 8.0 (Windows XP)",
        browser: Browser::InternetExplorer,
        version: "8.0",
        user_agent: "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 5.1; Trident/4.0; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        app_version: "4.0 (compatible; MSIE 8.0; Windows NT 5.1; Trident/4.0; .NET CLR 1.1.4322; .NET CLR 2.0.50727)",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "winxpchrome20",
        description: "Chrome 20.0.1132.47 (Windows XP)",
        browser: Browser::Chrome,
        version: "20.0.1132.47",
        user_agent: "Mozilla/5.0 (Windows NT 5.1) AppleWebKit/536.11 (KHTML, like Gecko) Chrome/20.0.1132.47 Safari/536.11",
        app_version: "5.0 (Windows NT 5.1) AppleWebKit/536.11 (KHTML, like Gecko) Chrome/20.0.1132.47 Safari/536.11",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "winxpfirefox12",
        description: "Firefox 12.0 (Windows XP)",
        browser: Browser::Firefox,
        version: "12.0",
        user_agent: "Mozilla/5.0 (Windows NT 5.1; rv:12.0) Gecko/20100101 Firefox/12.0",
        app_version: "5.0 (Windows)",
        platform: "Win32",
        java_user_agent: XP_JAVA,
    },
    Personality {
        key: "win7ie80",
        description: "Internet Explorer 8.0 (Windows 7)",
        browser: Browser::InternetExplorer,
        version: "8.0",
        user_agent: "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0; SLCC2; .NET CLR 2.0.50727; .NET CLR 3.5.30729; .NET CLR 3.0.30729)",
        app_version: "4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0; SLCC2; .NET CLR 2.0.50727; .NET CLR 3.5.30729; .NET CLR 3.0.30729)",
        platform: "Win32",
        java_user_agent: WIN7_JAVA,
    },
    Personality {
        key: "win7ie90",
        description: "Internet Explorer 9.0 (Windows 7)",
        browser: Browser::InternetExplorer,
        version: "9.0",
        user_agent: "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0)",
        app_version: "5.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0)",
        platform: "Win32",
        java_user_agent: WIN7_JAVA,
    },
    Personality {
        key: "win7chrome20",
        description: "Chrome 20.0.1132.47 (Windows 7)",
        browser: Browser::Chrome,
        version: "20.0.1132.47",
        user_agent: "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/536.11 (KHTML, like Gecko) Chrome/20.0.1132.47 Safari/536.11",
        app_version: "5.0 (Windows NT 6.1) AppleWebKit/536.11 (KHTML, like Gecko) Chrome/20.0.1132.47 Safari/536.11",
        platform: "Win32",
        java_user_agent: WIN7_JAVA,
    },
    Personality {
        key: "osx10safari5",
        description: "Safari 5.1.1 (MacOS X 10.7.2)",
        browser: Browser::Safari,
        version: "5.1.1",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_7_2) AppleWebKit/534.51.22 (KHTML, like Gecko) Version/5.1.1 Safari/534.51.22",
        app_version: "5.0 (Macintosh; Intel Mac OS X 10_7_2) AppleWebKit/534.51.22 (KHTML, like Gecko) Version/5.1.1 Safari/534.51.22",
        platform: "MacIntel",
        java_user_agent: Some("Mozilla/4.0 (Mac OS X 10.7.2) Java/{version}"),
    },
    Personality {
        key: "linuxfirefox19",
        description: "Firefox 19.0 (Linux)",
        browser: Browser::Firefox,
        version: "19.0",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:19.0) Gecko/20100101 Firefox/19.0",
        app_version: "5.0 (X11)",
        platform: "Linux x86_64",
        java_user_agent: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ie_detection() {
        assert!(Personality::lookup("winxpie60").unwrap().is_legacy_ie());
        assert!(Personality::lookup("WINXPIE80").unwrap().is_legacy_ie());
        let ie9 = Personality::lookup("win7ie90").unwrap();
        assert!(ie9.is_ie());
        assert!(!ie9.is_legacy_ie());
        assert!(!Personality::lookup("winxpchrome20").unwrap().is_ie());
        assert!(Personality::lookup("netscape4").is_none());
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("10.0", "9.0"), Ordering::Greater);
        assert_eq!(compare_versions("8.0", "9.0"), Ordering::Less);
        assert_eq!(compare_versions("9", "9.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("20.0.1132.47", "20.0.1132"), Ordering::Greater);
    }

    #[test]
    fn java_user_agent_uses_update_notation() {
        let personality = Personality::lookup("winxpie60").unwrap();
        assert_eq!(
            personality.java_user_agent("1.6.0.32").as_deref(),
            Some("Mozilla/4.0 (Windows XP 5.1) Java/1.6.0_32")
        );
        let linux = Personality::lookup("linuxfirefox19").unwrap();
        assert!(linux.java_user_agent("1.6.0.32").is_none());
    }
}
