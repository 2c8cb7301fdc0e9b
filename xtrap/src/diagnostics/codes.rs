use crate::adapter::ErrorCode;

pub type ErrorConstant = (ErrorCode, &'static str);

/// Syntax in BNF format:
/// ```text
/// "declare_error_codes!" "{"
///    "table" "=" <table-name> ";"
///    (<const-ident> "=>" <constant-name> "=" <code> ",")+
/// "}"
/// ```
/// Each `<const-ident>` becomes a `pub const` holding `<code>`, and
/// `<table-name>` lists every (`<code>`, `"<constant-name>"`) pair in
/// declaration order.
macro_rules! declare_error_codes {
    {
        table = $table : ident;
        $($konst : ident => $name : ident = $code : expr),+ $(,)?
    } => {
        $(pub const $konst : ErrorCode = $code;)+

        pub const $table : &[ErrorConstant] = &[
            $(($code, stringify!($name)),)+
        ];
    };
}

// Xlib's X.h, core protocol errors.
declare_error_codes! {
    table = X11_CORE_ERRORS;
    SUCCESS            => Success           = 0,
    BAD_REQUEST        => BadRequest        = 1,
    BAD_VALUE          => BadValue          = 2,
    BAD_WINDOW         => BadWindow         = 3,
    BAD_PIXMAP         => BadPixmap         = 4,
    BAD_ATOM           => BadAtom           = 5,
    BAD_CURSOR         => BadCursor         = 6,
    BAD_FONT           => BadFont           = 7,
    BAD_MATCH          => BadMatch          = 8,
    BAD_DRAWABLE       => BadDrawable       = 9,
    BAD_ACCESS         => BadAccess         = 10,
    BAD_ALLOC          => BadAlloc          = 11,
    BAD_COLOR          => BadColor          = 12,
    BAD_GC             => BadGC             = 13,
    BAD_ID_CHOICE      => BadIDChoice       = 14,
    BAD_NAME           => BadName           = 15,
    BAD_LENGTH         => BadLength         = 16,
    BAD_IMPLEMENTATION => BadImplementation = 17,
}

pub fn is_error_constant(name: &str) -> bool {
    name == "Success" || name.starts_with("Bad")
}
