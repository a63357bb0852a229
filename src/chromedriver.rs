use log::{info, warn};
use rand::Rng;
use std::env;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use tokio::net::TcpStream;
use zip::ZipArchive;

use crate::config::{BrowserConfig, WaitPolicy};
use crate::error::ProvisionError;
use crate::session::WebDriverSession;
use crate::wait::poll_until;

const APP_DIR: &str = "price-tracker";

/// A spawned chromedriver. Killed on [`DriverProcess::kill`] or when dropped,
/// so an aborted run does not leave it behind.
pub struct DriverProcess {
    child: Option<Child>,
}

impl DriverProcess {
    pub fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill chromedriver: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Starts chromedriver and opens a Chrome session configured from `config`.
pub async fn launch(
    config: &BrowserConfig,
    wait: &WaitPolicy,
) -> Result<WebDriverSession, ProvisionError> {
    let driver_path = match &config.chromedriver_path {
        Some(path) => path.clone(),
        None => ensure_chromedriver().await?,
    };

    let port: u16 = rand::thread_rng().gen_range(5000..9000);
    let child = Command::new(&driver_path)
        .arg(format!("--port={}", port))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let process = DriverProcess { child: Some(child) };
    info!("Started chromedriver {:?} on port {}", driver_path, port);

    let listening = poll_until(wait, || async move {
        Ok::<_, ProvisionError>(TcpStream::connect(("127.0.0.1", port)).await.is_ok())
    })
    .await?;
    if !listening {
        warn!("chromedriver not listening on port {} yet, connecting anyway", port);
    }

    let caps = chrome_capabilities(config)?;
    let driver = WebDriver::new(&format!("http://localhost:{}", port), caps)
        .await
        .map_err(|source| ProvisionError::Connect { port, source })?;

    Ok(WebDriverSession::new(driver, Some(process), wait.clone()))
}

fn chrome_capabilities(config: &BrowserConfig) -> Result<ChromeCapabilities, ProvisionError> {
    let mut caps = DesiredCapabilities::chrome();
    for arg in chrome_args(config) {
        caps.add_chrome_arg(&arg)
            .map_err(ProvisionError::Capability)?;
    }
    Ok(caps)
}

fn chrome_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        format!("--window-size={}", config.window_size),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if config.incognito {
        args.push("--incognito".to_string());
    }
    if config.ignore_certificate_errors {
        args.push("--ignore-certificate-errors".to_string());
    }
    if let Some(profile) = config.chrome_profile.as_deref().filter(|p| !p.is_empty()) {
        args.push(format!("--user-data-dir={}", profile));
    }
    args
}

/// Returns a chromedriver matching the installed Chrome, downloading one into
/// the local data directory if needed.
pub async fn ensure_chromedriver() -> Result<PathBuf, ProvisionError> {
    let driver_dir = dirs::data_local_dir()
        .ok_or(ProvisionError::NoDataDir)?
        .join(APP_DIR)
        .join("chromedriver");
    fs::create_dir_all(&driver_dir)?;

    let os = env::consts::OS;
    let chrome_version = get_chrome_version()?;
    let major = major_version(&chrome_version).to_string();
    info!("Detected Chrome version: {}", chrome_version);

    let driver_path = driver_dir.join(driver_filename(os)?);

    if driver_path.exists() {
        match get_existing_driver_version(&driver_path) {
            Ok(existing) if major_version(&existing) == major => {
                info!("Compatible chromedriver already exists");
                return Ok(driver_path);
            }
            Ok(existing) => info!(
                "Existing chromedriver {} is incompatible with Chrome {}",
                existing, chrome_version
            ),
            Err(e) => warn!("Could not check existing chromedriver: {}", e),
        }
    }

    info!("Downloading compatible chromedriver...");
    download_chromedriver(&driver_path, &major, os).await?;
    Ok(driver_path)
}

fn driver_filename(os: &str) -> Result<&'static str, ProvisionError> {
    match os {
        "linux" | "macos" => Ok("chromedriver"),
        "windows" => Ok("chromedriver.exe"),
        other => Err(ProvisionError::UnsupportedOs(other.to_string())),
    }
}

fn platform_name(os: &str, arch: &str) -> Result<&'static str, ProvisionError> {
    match (os, arch) {
        ("linux", _) => Ok("linux64"),
        ("macos", "aarch64") => Ok("mac-arm64"),
        ("macos", _) => Ok("mac-x64"),
        ("windows", _) => Ok("win64"),
        (other, _) => Err(ProvisionError::UnsupportedOs(other.to_string())),
    }
}

fn get_existing_driver_version(driver_path: &Path) -> Result<String, ProvisionError> {
    let output = Command::new(driver_path).arg("--version").output()?;
    // "ChromeDriver 120.0.6099.109 (...)"
    parse_version(&String::from_utf8_lossy(&output.stdout), 1)
}

async fn download_chromedriver(
    driver_path: &Path,
    major_version: &str,
    os: &str,
) -> Result<(), ProvisionError> {
    let client = reqwest::Client::new();

    let version_url = format!(
        "https://googlechromelabs.github.io/chrome-for-testing/LATEST_RELEASE_{}",
        major_version
    );
    let driver_version = client
        .get(&version_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?
        .trim()
        .to_string();
    info!("Downloading chromedriver version: {}", driver_version);

    let platform = platform_name(os, env::consts::ARCH)?;
    let download_url = format!(
        "https://storage.googleapis.com/chrome-for-testing-public/{}/{}/chromedriver-{}.zip",
        driver_version, platform, platform
    );
    let bytes = client
        .get(&download_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let contents = extract_driver(&bytes, driver_filename(os)?)?;
    fs::write(driver_path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(driver_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(driver_path, perms)?;
    }

    info!("Chromedriver downloaded to: {:?}", driver_path);
    Ok(())
}

/// The archive nests the binary in a platform directory, so match on the
/// file name only.
fn extract_driver(zip_bytes: &[u8], filename: &str) -> Result<Vec<u8>, ProvisionError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        if name == filename || name.ends_with(&format!("/{}", filename)) {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
    }
    Err(ProvisionError::MissingBinary)
}

pub fn find_chrome_executable() -> Result<PathBuf, ProvisionError> {
    let candidates: &[&str] = match env::consts::OS {
        "windows" => &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ],
        "macos" => &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"],
        "linux" => &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ],
        other => return Err(ProvisionError::UnsupportedOs(other.to_string())),
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Ok(path);
    }

    let (finder, name) = if cfg!(windows) {
        ("where", "chrome.exe")
    } else {
        ("which", "google-chrome")
    };
    if let Ok(output) = Command::new(finder).arg(name).output() {
        let path = String::from_utf8_lossy(&output.stdout);
        let path = path.lines().next().unwrap_or("").trim();
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    Err(ProvisionError::ChromeNotFound)
}

pub fn get_chrome_version() -> Result<String, ProvisionError> {
    let chrome_path = find_chrome_executable()?;
    info!("Found Chrome at: {:?}", chrome_path);

    let output = Command::new(&chrome_path).arg("--version").output()?;
    let version_output = String::from_utf8_lossy(&output.stdout);
    // "Google Chrome 120.0.6099.109"
    let last = version_output.split_whitespace().count().saturating_sub(1);
    parse_version(&version_output, last)
}

fn parse_version(output: &str, position: usize) -> Result<String, ProvisionError> {
    output
        .split_whitespace()
        .nth(position)
        .filter(|v| v.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .ok_or_else(|| ProvisionError::Version(output.trim().to_string()))
}

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn parses_driver_and_chrome_versions() {
        assert_eq!(
            parse_version("ChromeDriver 120.0.6099.109 (3419140ab665)", 1).unwrap(),
            "120.0.6099.109"
        );
        assert_eq!(
            parse_version("Google Chrome 120.0.6099.109 ", 2).unwrap(),
            "120.0.6099.109"
        );
        assert!(parse_version("command not found", 1).is_err());
        assert_eq!(major_version("120.0.6099.109"), "120");
    }

    #[test]
    fn platform_names() {
        assert_eq!(platform_name("linux", "x86_64").unwrap(), "linux64");
        assert_eq!(platform_name("macos", "aarch64").unwrap(), "mac-arm64");
        assert_eq!(platform_name("windows", "x86_64").unwrap(), "win64");
        assert!(platform_name("haiku", "x86_64").is_err());
    }

    #[test]
    fn chrome_args_follow_config() {
        let mut config = BrowserConfig::default();
        let args = chrome_args(&config);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--incognito".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));

        config.headless = false;
        config.chrome_profile = Some("/tmp/profile".into());
        let args = chrome_args(&config);
        assert!(!args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
    }

    #[test]
    fn extracts_nested_driver_from_zip() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();
            zip.start_file("chromedriver-linux64/LICENSE.chromedriver", options)
                .unwrap();
            zip.write_all(b"license").unwrap();
            zip.start_file("chromedriver-linux64/chromedriver", options)
                .unwrap();
            zip.write_all(b"\x7fELF").unwrap();
            zip.finish().unwrap();
        }

        let bytes = buf.into_inner();
        assert_eq!(extract_driver(&bytes, "chromedriver").unwrap(), b"\x7fELF");
        assert!(matches!(
            extract_driver(&bytes, "chromedriver.exe"),
            Err(ProvisionError::MissingBinary)
        ));
    }
}
