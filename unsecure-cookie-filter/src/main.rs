// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command line front-end of the unsecure cookie filter: validates a configuration file or runs
//! a response header block through the filter chain.

use clap::Parser;
use filter_utils::pingora::{
    make_request_header, make_response_header, Error, ErrorType, ResponseHeader,
};
use filter_utils::{FilterChain, FromYaml};
use http::header::{HeaderName, HeaderValue, HOST};
use log::{error, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use unsecure_cookie_module::{UnsecureCookieConf, UnsecureCookieHandler};

/// Remove the Secure attribute from configured Set-Cookie response headers
#[derive(Debug, Parser)]
struct Opt {
    /// The path to the configuration file. Without it, the filter is disabled.
    #[clap(short, long)]
    conf: Option<PathBuf>,

    /// Test the configuration and exit.
    #[clap(short, long)]
    test: bool,

    /// Host name the response is sent for, e.g. "example.com" or "localhost:8080".
    #[clap(long)]
    host: Option<String>,

    /// Request path the response is sent for.
    #[clap(long, default_value = "/")]
    path: String,

    /// File containing the response header block, standard input if omitted.
    input: Option<PathBuf>,
}

/// A response header block: optional status line followed by the header fields
#[derive(Debug)]
struct HeaderBlock {
    status_line: Option<String>,
    /// Header names as spelled in the input, in input order
    fields: Vec<(String, HeaderName)>,
    response: ResponseHeader,
}

fn parse_header_block(reader: impl BufRead) -> Result<HeaderBlock, Box<Error>> {
    let mut status_line = None;
    let mut fields = Vec::new();
    let mut response = make_response_header();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| {
            Error::because(ErrorType::ReadError, "failed reading header block", err)
        })?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }

        if index == 0 && line.starts_with("HTTP/") {
            status_line = Some(line.to_owned());
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            Error::explain(
                ErrorType::InvalidHTTPHeader,
                format!("line {}: expected a header field", index + 1),
            )
        })?;
        let spelling = name.trim();
        let name = HeaderName::from_bytes(spelling.as_bytes()).map_err(|err| {
            Error::because(
                ErrorType::InvalidHTTPHeader,
                format!("line {}: invalid header name", index + 1),
                err,
            )
        })?;
        let value = HeaderValue::from_str(value.trim()).map_err(|err| {
            Error::because(
                ErrorType::InvalidHTTPHeader,
                format!("line {}: invalid header value", index + 1),
                err,
            )
        })?;
        fields.push((spelling.to_owned(), name.clone()));
        response.headers.append(name, value);
    }

    Ok(HeaderBlock {
        status_line,
        fields,
        response,
    })
}

fn write_header_block(mut writer: impl Write, block: &HeaderBlock) -> std::io::Result<()> {
    if let Some(status_line) = &block.status_line {
        write!(writer, "{status_line}\r\n")?;
    }

    // Values of a name are rewritten in place, so the n-th input line of a name corresponds to
    // its n-th value.
    let mut written: HashMap<&HeaderName, usize> = HashMap::new();
    for (spelling, name) in &block.fields {
        let index = written.entry(name).or_default();
        if let Some(value) = block.response.headers.get_all(name).iter().nth(*index) {
            write_field(&mut writer, spelling, value)?;
        }
        *index += 1;
    }

    // Headers added by the filter chain go last
    for name in block.response.headers.keys() {
        let skip = written.get(name).copied().unwrap_or(0);
        for value in block.response.headers.get_all(name).iter().skip(skip) {
            write_field(&mut writer, name.as_str(), value)?;
        }
    }
    writer.write_all(b"\r\n")
}

fn write_field(mut writer: impl Write, name: &str, value: &HeaderValue) -> std::io::Result<()> {
    writer.write_all(name.as_bytes())?;
    writer.write_all(b": ")?;
    writer.write_all(value.as_bytes())?;
    writer.write_all(b"\r\n")
}

fn load_conf(opt: &Opt) -> Result<UnsecureCookieConf, Box<Error>> {
    if let Some(path) = &opt.conf {
        UnsecureCookieConf::load_from_yaml(path)
    } else {
        Ok(UnsecureCookieConf::default())
    }
}

fn run(opt: Opt) -> Result<(), Box<Error>> {
    let handler = UnsecureCookieHandler::try_from(load_conf(&opt)?)?;
    if opt.test {
        info!("Configuration is valid");
        return Ok(());
    }

    let chain = FilterChain::builder().push(handler).build();

    let mut request = make_request_header(&opt.path)?;
    if let Some(host) = &opt.host {
        let host = HeaderValue::from_str(host).map_err(|err| {
            Error::because(ErrorType::InvalidHTTPHeader, "invalid host name", err)
        })?;
        request.headers.insert(HOST, host);
    }

    let mut block = if let Some(input) = &opt.input {
        let file = File::open(input).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!("failed opening {}", input.display()),
                err,
            )
        })?;
        parse_header_block(BufReader::new(file))?
    } else {
        parse_header_block(std::io::stdin().lock())?
    };

    chain.run(&request, &mut block.response)?;

    write_header_block(std::io::stdout().lock(), &block)
        .map_err(|err| Error::because(ErrorType::WriteError, "failed writing output", err))
}

fn main() -> ExitCode {
    env_logger::init();

    let opt = Opt::parse();
    if let Err(err) = run(opt) {
        error!("{err}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header::SET_COOKIE;
    use test_log::test;

    #[test]
    fn header_block() -> Result<(), Box<Error>> {
        let input = "HTTP/1.1 200 OK\r\nSet-Cookie: a=1; Secure\r\nServer: test\r\n\r\nbody";
        let block = parse_header_block(input.as_bytes())?;
        assert_eq!(block.status_line.as_deref(), Some("HTTP/1.1 200 OK"));
        assert_eq!(block.response.headers.len(), 2);
        assert_eq!(block.response.headers[SET_COOKIE], "a=1; Secure");

        let mut output = Vec::new();
        write_header_block(&mut output, &block).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "HTTP/1.1 200 OK\r\nSet-Cookie: a=1; Secure\r\nServer: test\r\n\r\n"
        );
        Ok(())
    }

    #[test]
    fn interleaved_headers_keep_order() -> Result<(), Box<Error>> {
        let conf = UnsecureCookieConf::from_yaml("unsecure_cookie: b")?;
        let chain = FilterChain::builder()
            .push(UnsecureCookieHandler::try_from(conf)?)
            .build();
        let request = make_request_header("/")?;

        let input = "Set-Cookie: a=1; Secure\r\nServer: test\r\nset-cookie: b=2; Secure\r\nX-Custom: 1\r\nSet-Cookie: c=3; Secure\r\n\r\n";
        let mut block = parse_header_block(input.as_bytes())?;
        chain.run(&request, &mut block.response)?;

        let mut output = Vec::new();
        write_header_block(&mut output, &block).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Set-Cookie: a=1; Secure\r\nServer: test\r\nset-cookie: b=2\r\nX-Custom: 1\r\nSet-Cookie: c=3; Secure\r\n\r\n"
        );
        Ok(())
    }

    #[test]
    fn added_headers_written_last() -> Result<(), Box<Error>> {
        let mut block = parse_header_block("Server: test\r\n".as_bytes())?;
        block
            .response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static("a=1"));

        let mut output = Vec::new();
        write_header_block(&mut output, &block).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Server: test\r\nset-cookie: a=1\r\n\r\n"
        );
        Ok(())
    }

    #[test]
    fn without_status_line() -> Result<(), Box<Error>> {
        let block = parse_header_block("Set-Cookie: a=1\nSet-Cookie: b=2\n".as_bytes())?;
        assert_eq!(block.status_line, None);
        assert_eq!(block.response.headers.get_all(SET_COOKIE).iter().count(), 2);
        Ok(())
    }

    #[test]
    fn invalid_lines() {
        assert!(parse_header_block("no colon here\n".as_bytes()).is_err());
        assert!(parse_header_block("Bad Name: x\n".as_bytes()).is_err());
    }

    #[test]
    fn disabled_without_configuration() -> Result<(), Box<Error>> {
        let opt = Opt::parse_from(["unsecure-cookie-filter", "--test"]);
        assert!(opt.test);
        assert_eq!(load_conf(&opt)?, UnsecureCookieConf::default());
        Ok(())
    }
}
