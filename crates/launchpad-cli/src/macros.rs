/// Paints text when stdout is a terminal, and leaves it plain otherwise.
macro_rules! colorize_impl {
    ($color_expr:expr, $($arg:tt)*) => {
        {
            use atty::Stream;
            if atty::is(Stream::Stdout) {
                format!("{}", $color_expr.paint(format!($($arg)*)))
            } else {
                format!($($arg)*)
            }
        }
    }
}

#[allow(unused_macros)]
macro_rules! green {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Green.bold(), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! red {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Red.bold(), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! yellow {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Yellow.bold(), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! blue {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Cyan.bold(), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! purple {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Purple.bold(), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! black {
    ($($arg:tt)*) => {
        colorize_impl!(ansi_term::Colour::Fixed(244), $($arg)*)
    }
}

macro_rules! pluralize {
    ($value:expr, $word:expr) => {
        if $value == 1 {
            format!("{} {}", $value, $word)
        } else {
            format!("{} {}s", $value, $word)
        }
    };
}

#[allow(unused_macros)]
macro_rules! format_err {
    ($($arg:tt)*) => {
        format!("{} {}", red!("error:"), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! format_warn {
    ($($arg:tt)*) => {
        format!("{} {}", yellow!("warn:"), $($arg)*)
    }
}

#[allow(unused_macros)]
macro_rules! format_note {
    ($($arg:tt)*) => {
        format!("{} {}", blue!("note:"), $($arg)*)
    }
}
