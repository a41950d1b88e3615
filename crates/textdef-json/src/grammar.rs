use textdef::{Grammar, GrammarError, NodeHandle, ParseError, ParseOptions};

use crate::{decode, json::Json};

/// The JSON grammar together with handles to its interesting rules.
///
/// Rules ending in `_value` carry semantic actions, the others produce the raw
/// result tree.
pub struct JsonGrammar {
    grammar: Grammar,
    /// Any run of spaces, newlines, carriage returns and tabs.
    pub whitespace: NodeHandle,
    pub number: NodeHandle,
    /// [`number`](Self::number) decoded into [`textdef::Value::Number`].
    pub number_value: NodeHandle,
    pub string: NodeHandle,
    /// [`string`](Self::string) with escapes decoded into [`textdef::Value::Text`].
    pub string_value: NodeHandle,
    /// A complete JSON value surrounded by optional whitespace.
    pub value: NodeHandle,
    /// [`value`](Self::value) converted into a [`Json`] stored in [`textdef::Value::Custom`].
    pub value_json: NodeHandle,
}

impl JsonGrammar {
    pub fn new() -> Result<JsonGrammar, GrammarError> {
        let mut g = Grammar::new();

        let whitespace = g.literal_choice([" ", "\n", "\r", "\t"]);
        let whitespace = g.repeat(whitespace);

        // digits
        let digit19 = g.char_range('1', '9')?;
        let digit19 = g.action(digit19, decode::digit);
        let zero = g.literal("0");
        let digit = g.choice([zero, digit19]);
        let digit_value = g.action(digit, decode::digit);
        let lower_hex = g.char_range('a', 'f')?;
        let upper_hex = g.char_range('A', 'F')?;
        let hex_digit = g.choice([digit_value, lower_hex, upper_hex]);
        let hex_digit = g.action(hex_digit, decode::hex_digit);

        // number
        let minus = g.literal("-");
        let sign = g.optional(minus);

        let zero = g.literal("0");
        let more_digits = g.repeat(digit_value);
        let nonzero = g.sequence([digit19, more_digits]);
        let integer = g.choice([zero, nonzero]);

        let dot = g.literal(".");
        let fraction_digits = g.repeat_at_least_once(digit_value);
        let fraction = g.sequence([dot, fraction_digits]);
        let fraction = g.optional(fraction);

        let e = g.literal_choice(["e", "E"]);
        let exponent_sign = g.literal_choice(["+", "-"]);
        let exponent_sign = g.optional(exponent_sign);
        let exponent_digits = g.repeat_at_least_once(digit_value);
        let exponent = g.sequence([e, exponent_sign, exponent_digits]);
        let exponent = g.optional(exponent);

        let number = g.sequence([sign, integer, fraction, exponent]);
        let number_value = g.action(number, decode::number);

        // string
        let quote = g.literal("\"");
        let any = g.char_range(' ', char::MAX)?;
        let special = g.literal_choice(["\"", "\\"]);
        let plain = g.exclude(any, special);

        let backslash = g.literal("\\");
        let simple_escape = g.literal_choice(["\"", "\\", "/", "b", "f", "n", "r", "t"]);
        let u = g.literal("u");
        let code_unit = g.repeat_exact(hex_digit, 4);
        let unicode_escape = g.sequence([u, code_unit]);
        let escape = g.choice([simple_escape, unicode_escape]);
        let escape = g.sequence([backslash, escape]);

        let character = g.choice([plain, escape]);
        let characters = g.repeat(character);
        let string = g.sequence([quote, characters, quote]);
        let string_value = g.action(string, decode::string);

        // composite values
        let (value_rec, value_resolve) = g.create_recursion();
        let (array_rec, array_resolve) = g.create_recursion();
        let (object_rec, object_resolve) = g.create_recursion();

        let comma = g.literal(",");

        let open = g.literal("[");
        let close = g.literal("]");
        let items = g.repeat_alternating(value_rec, comma);
        let items = g.capture("items", items);
        let empty = g.capture("empty", whitespace);
        let items = g.choice([items, empty]);
        let array = g.sequence([open, items, close]);

        let open = g.literal("{");
        let close = g.literal("}");
        let colon = g.literal(":");
        let pair = g.sequence([whitespace, string_value, whitespace, colon, value_rec]);
        let pairs = g.repeat_alternating(pair, comma);
        let pairs = g.capture("pair", pairs);
        let empty = g.capture("empty", whitespace);
        let pairs = g.choice([pairs, empty]);
        let object = g.sequence([open, pairs, close]);

        let keyword = g.literal_choice(["true", "false", "null"]);
        let number_capture = g.capture("number", number_value);
        let string_capture = g.capture("string", string_value);
        let object_capture = g.capture("object", object_rec);
        let array_capture = g.capture("array", array_rec);
        let inner = g.choice([
            keyword,
            number_capture,
            string_capture,
            object_capture,
            array_capture,
        ]);
        let value = g.sequence([whitespace, inner, whitespace]);
        let value_json = g.action(value, decode::json);

        value_resolve.resolve(&mut g, value)?;
        array_resolve.resolve(&mut g, array)?;
        object_resolve.resolve(&mut g, object)?;

        Ok(JsonGrammar {
            grammar: g,
            whitespace,
            number,
            number_value,
            string,
            string_value,
            value,
            value_json,
        })
    }
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
    pub fn parse(&self, input: &str) -> Result<Json, ParseError> {
        self.parse_with(input, &ParseOptions::default())
    }
    pub fn parse_with(&self, input: &str, options: &ParseOptions) -> Result<Json, ParseError> {
        let value = self.grammar.parse_with(self.value_json, input, options)?;
        value
            .into_custom::<Json>()
            .ok_or_else(|| ParseError::Transform {
                position: 0,
                message: "JSON action produced a foreign value".into(),
            })
    }
    pub fn validate(&self, input: &str) -> bool {
        self.grammar.validate(self.value_json, input)
    }
    pub fn validate_with(&self, input: &str, options: &ParseOptions) -> bool {
        self.grammar.validate_with(self.value_json, input, options)
    }
}
