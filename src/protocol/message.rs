use crate::utils::text;

/// A validated inbound protocol message. Quantities are strictly
/// positive; keys are non-negative. A `Defer` carries its nested
/// operation raw; it is only validated when the deferral fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { port: String },
    Im { port: String, name: String },
    Deliver { quantity: i64, kind: String },
    Withdraw { quantity: i64, kind: String },
    Transfer { quantity: i64, kind: String, dest: String },
    Defer { key: i64, operation: String },
    Execute { key: i64 },
}

impl Command {
    /// Classify and validate one wire line (trailing newline already
    /// stripped). Returns None for anything malformed; callers drop such
    /// lines without reply.
    pub fn parse(line: &str) -> Option<Command> {
        match line.as_bytes().first()? {
            b'C' => parse_connect(line),
            b'D' => {
                if line.starts_with("Deliver:") {
                    parse_adjust(line, Adjust::Deliver)
                } else {
                    parse_defer(line)
                }
            }
            b'W' => parse_adjust(line, Adjust::Withdraw),
            b'T' => parse_transfer(line),
            b'E' => parse_execute(line),
            b'I' => parse_im(line),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Adjust {
    Deliver,
    Withdraw,
}

fn parse_quantity(field: &str) -> Option<i64> {
    if !text::is_nonneg_integer(field) {
        return None;
    }
    let quantity = field.parse::<i64>().ok()?;
    (quantity > 0).then_some(quantity)
}

fn parse_key(field: &str) -> Option<i64> {
    if !text::is_nonneg_integer(field) {
        return None;
    }
    field.parse::<i64>().ok()
}

fn parse_connect(line: &str) -> Option<Command> {
    if !line.starts_with("Connect:") || text::count_delim(line, ':') != 1 {
        return None;
    }
    let port = text::split_on(line, ':', 1)[1];
    if !text::is_nonneg_integer(port) {
        return None;
    }
    Some(Command::Connect {
        port: port.to_string(),
    })
}

fn parse_im(line: &str) -> Option<Command> {
    if !line.starts_with("IM:") || text::count_delim(line, ':') != 2 {
        return None;
    }
    let fields = text::split_on(line, ':', 2);
    let (port, name) = (fields[1], fields[2]);
    if !text::is_nonneg_integer(port) || !text::valid_name(name) {
        return None;
    }
    Some(Command::Im {
        port: port.to_string(),
        name: name.to_string(),
    })
}

fn parse_adjust(line: &str, direction: Adjust) -> Option<Command> {
    let prefix = match direction {
        Adjust::Deliver => "Deliver:",
        Adjust::Withdraw => "Withdraw:",
    };
    if !line.starts_with(prefix) || text::count_delim(line, ':') != 2 {
        return None;
    }
    let fields = text::split_on(line, ':', 2);
    let quantity = parse_quantity(fields[1])?;
    let kind = fields[2];
    if !text::valid_name(kind) {
        return None;
    }
    Some(match direction {
        Adjust::Deliver => Command::Deliver {
            quantity,
            kind: kind.to_string(),
        },
        Adjust::Withdraw => Command::Withdraw {
            quantity,
            kind: kind.to_string(),
        },
    })
}

fn parse_transfer(line: &str) -> Option<Command> {
    if !line.starts_with("Transfer:") || text::count_delim(line, ':') != 3 {
        return None;
    }
    let fields = text::split_on(line, ':', 3);
    let quantity = parse_quantity(fields[1])?;
    let (kind, dest) = (fields[2], fields[3]);
    if !text::valid_name(kind) || !text::valid_name(dest) {
        return None;
    }
    Some(Command::Transfer {
        quantity,
        kind: kind.to_string(),
        dest: dest.to_string(),
    })
}

fn parse_defer(line: &str) -> Option<Command> {
    if !line.starts_with("Defer:") {
        return None;
    }
    let fields = text::split_on(line, ':', 2);
    if fields.len() != 3 {
        // the wrapper needs its own two delimiters around the key
        return None;
    }
    let key = parse_key(fields[1])?;
    Some(Command::Defer {
        key,
        operation: fields[2].to_string(),
    })
}

fn parse_execute(line: &str) -> Option<Command> {
    if !line.starts_with("Execute:") || text::count_delim(line, ':') != 1 {
        return None;
    }
    let key = parse_key(text::split_on(line, ':', 1)[1])?;
    Some(Command::Execute { key })
}
