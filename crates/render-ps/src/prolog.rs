//! The procedure dictionary every PostScript page relies on.
//!
//! Operand conventions:
//! - `r g b C` sets an RGB color, `w W` the line width
//! - `x y r P` fills a disc
//! - `x y LS`, `x y L`, `x y LE` start, extend and stroke a polyline
//! - `x3 y3 x2 y2 x1 y1 T` fills a flat triangle
//! - `(str) x y size /Font S` shows a string; the `S??` variants align it and an
//!   `R` suffix takes a leading rotation angle

pub const PROLOG: &str = "%%BeginProlog
/vexdict 64 dict def vexdict begin
0 setlinecap 0 setlinejoin
/BD { bind def } bind def
/C  { setrgbcolor } BD
/W  { setlinewidth } BD
/FC { findfont exch /SH exch def SH scalefont setfont } BD
/SW { dup stringwidth pop } BD
/S  { FC moveto show } BD
/SBC{ FC moveto SW -2 div 0 rmoveto show } BD
/SBR{ FC moveto SW neg 0 rmoveto show } BD
/SCL{ FC moveto 0 SH -2 div rmoveto show } BD
/SCC{ FC moveto SW -2 div SH -2 div rmoveto show } BD
/SCR{ FC moveto SW neg SH -2 div rmoveto show } BD
/STL{ FC moveto 0 SH neg rmoveto show } BD
/STC{ FC moveto SW -2 div SH neg rmoveto show } BD
/STR{ FC moveto SW neg SH neg rmoveto show } BD
/FCT { FC translate 0 0 } BD
/SR  { gsave FCT moveto rotate show grestore } BD
/SBCR{ gsave FCT moveto rotate SW -2 div 0 rmoveto show grestore } BD
/SBRR{ gsave FCT moveto rotate SW neg 0 rmoveto show grestore } BD
/SCLR{ gsave FCT moveto rotate 0 SH -2 div rmoveto show grestore } BD
/SCCR{ gsave FCT moveto rotate SW -2 div SH -2 div rmoveto show grestore } BD
/SCRR{ gsave FCT moveto rotate SW neg SH -2 div rmoveto show grestore } BD
/STLR{ gsave FCT moveto rotate 0 SH neg rmoveto show grestore } BD
/STCR{ gsave FCT moveto rotate SW -2 div SH neg rmoveto show grestore } BD
/STRR{ gsave FCT moveto rotate SW neg SH neg rmoveto show grestore } BD
/P  { newpath 0.0 360.0 arc closepath fill } BD
/LS { newpath moveto } BD
/L  { lineto } BD
/LE { lineto stroke } BD
/T  { newpath moveto lineto lineto closepath fill } BD
end
%%EndProlog
%%BeginSetup
/DeviceRGB setcolorspace
vexdict begin
%%EndSetup
%%Page: 1 1
%%BeginPageSetup
%%EndPageSetup
mark
gsave
1.0 1.0 scale
";

pub const FOOTER: &str = "grestore
showpage
cleartomark
%%PageTrailer
%%Trailer
end
%%EOF
";
