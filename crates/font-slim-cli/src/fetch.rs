//! Fetching chars to retain from a plain HTTP URL.

use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, ensure, Context as _};

/// Timeout for the entire fetch, from connecting to reading the response.
pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq)]
struct HttpUrl<'a> {
    host: &'a str,
    port: u16,
    path: &'a str,
}

impl<'a> HttpUrl<'a> {
    fn parse(url: &'a str) -> anyhow::Result<Self> {
        let Some(rest) = url.strip_prefix("http://") else {
            if url.starts_with("https://") {
                bail!("HTTPS URLs are not supported; save the page and use `--chars-file`");
            }
            bail!("unsupported URL `{url}`; expected an `http://` URL");
        };
        let (authority, path) = match rest.find(['/', '?', '#']) {
            Some(pos) if rest[pos..].starts_with('/') => (&rest[..pos], &rest[pos..]),
            Some(pos) => (&rest[..pos], "/"),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .with_context(|| format!("invalid port in URL `{url}`"))?;
                (host, port)
            }
            None => (authority, 80),
        };
        ensure!(!host.is_empty(), "no host in URL `{url}`");
        Ok(Self { host, port, path })
    }
}

/// Fetches a text document over HTTP/1.0, so that the response is never chunked.
pub(crate) fn fetch_text(url: &str, timeout: Duration) -> anyhow::Result<String> {
    let deadline = Instant::now() + timeout;
    let url = HttpUrl::parse(url)?;
    let addr = (url.host, url.port)
        .to_socket_addrs()
        .with_context(|| format!("failed resolving host `{}`", url.host))?
        .next()
        .ok_or_else(|| anyhow!("host `{}` has no addresses", url.host))?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .with_context(|| format!("failed connecting to {addr}"))?;
    stream.set_write_timeout(Some(timeout))?;
    write!(
        stream,
        "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: font-slim\r\nConnection: close\r\n\r\n",
        url.path, url.host
    )?;

    let mut response = vec![];
    let mut buffer = [0_u8; 8_192];
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
            .ok_or_else(|| anyhow!("timed out after {timeout:?}"))?;
        stream.set_read_timeout(Some(remaining))?;
        match stream.read(&mut buffer).context("failed reading response")? {
            0 => break,
            len => response.extend_from_slice(&buffer[..len]),
        }
    }
    parse_response(&response)
}

fn parse_response(response: &[u8]) -> anyhow::Result<String> {
    let header_end = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .context("malformed HTTP response: no end of headers")?;
    let head = String::from_utf8_lossy(&response[..header_end]);
    let status_line = head.lines().next().unwrap_or_default();
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .with_context(|| format!("malformed HTTP status line `{status_line}`"))?;
    ensure!(
        (200..300).contains(&status),
        "server responded with `{status_line}`"
    );

    let body = &response[header_end + 4..];
    Ok(String::from_utf8_lossy(body).into_owned())
}
