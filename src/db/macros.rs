/// Build a dynamic SQL SET clause field-by-field.
///
/// Checks if an `Option` value is `Some`, and if so, appends
/// `"column = ?N"` to `sets` and increments `param_idx`.
///
/// # Usage
///
/// ```ignore
/// // With an `input` struct whose fields are Option<T>:
/// push_field!(input.display_name, "display_name", sets, param_idx);
///
/// // With a local Option variable:
/// push_field!(password_hash, "password_hash", sets, param_idx);
/// ```
#[macro_export]
macro_rules! push_field {
    ($field:expr, $col:literal, $sets:expr, $param_idx:expr) => {
        if $field.is_some() {
            $sets.push(format!("{} = ?{}", $col, $param_idx));
            $param_idx += 1;
        }
    };
}

/// Give a fieldless enum its stored text form.
///
/// Generates `as_str`, `parse` (trimmed, exact match) and `Display`.
/// Lenient fallbacks for legacy rows live next to each enum.
#[macro_export]
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
